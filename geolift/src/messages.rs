//! Operator-facing message aggregation.
//!
//! Every pipeline operation reports its outcome as a [`MessageBag`]: three
//! ordered lists of info, warning, and error lines. The bag is the only
//! user-visible output contract — callers see the bag plus one
//! [`TaskStatus`] code, never a stack trace.

use serde::{Deserialize, Serialize};

/// Section headers injected before a message run for log readability.
///
/// The exact text is part of the operator contract: people grep these
/// headers out of worker logs.
pub mod headers {
    /// Header preceding error messages.
    pub const ERRORS: &str = "* ------------ Errors -------------";
    /// Header preceding warning messages.
    pub const WARNINGS: &str = "* ----------- Warnings ------------";
    /// Header preceding informational messages.
    pub const INFORMATION: &str = "* --------- Information -----------";
    /// Header preceding field listings.
    pub const FIELDS: &str = "* ------------ Fields -------------";
    /// Header preceding ETL performance statistics.
    pub const STATS: &str = "* ------------- Stats -------------";
}

/// Terminal status of a task or CLI invocation.
///
/// The numeric codes are stable: they are persisted to the shared store
/// and used as process exit codes, so operators and the upload portal
/// depend on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// The operation completed and its results were persisted.
    Success,
    /// The task identifier has no registered metadata.
    NotFound,
    /// The task's data is broken; partial artifacts were rolled back.
    Failure,
    /// A concurrent worker already finished this task.
    AlreadyDone,
}

impl TaskStatus {
    /// Returns the wire/exit code for this status.
    pub fn code(&self) -> i32 {
        match self {
            TaskStatus::Success => 0,
            TaskStatus::NotFound => 1,
            TaskStatus::Failure => 2,
            TaskStatus::AlreadyDone => 3,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskStatus::Success => "success",
            TaskStatus::NotFound => "not-found",
            TaskStatus::Failure => "failure",
            TaskStatus::AlreadyDone => "already-done",
        };
        write!(f, "{name}")
    }
}

/// The `{info, warn, error}` triple used uniformly for operator output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBag {
    /// Informational lines (properties, field listings, statistics).
    pub info: Vec<String>,
    /// Warning lines (dropped fields, contention notices).
    pub warn: Vec<String>,
    /// Error lines (tool failures, bad geometry).
    pub error: Vec<String>,
}

impl MessageBag {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bag holding a single error line.
    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            error: vec![message.into()],
            ..Self::default()
        }
    }

    /// Returns true if the bag contains at least one error.
    pub fn has_errors(&self) -> bool {
        !self.error.is_empty()
    }

    /// Returns true if every list is empty.
    pub fn is_empty(&self) -> bool {
        self.info.is_empty() && self.warn.is_empty() && self.error.is_empty()
    }

    /// Appends all messages from `other`, preserving order.
    pub fn extend(&mut self, other: MessageBag) {
        self.info.extend(other.info);
        self.warn.extend(other.warn);
        self.error.extend(other.error);
    }

    /// Collapses duplicate error strings, keeping first-seen order.
    ///
    /// GDAL repeats the same diagnostic for every affected feature;
    /// operators only need it once.
    pub fn dedupe_errors(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.error.retain(|e| seen.insert(e.clone()));
    }
}

/// Canned errors shared by the pipeline and the CLI.
pub mod canned {
    use super::MessageBag;

    /// The task was received but no record exists for its identifier.
    pub fn record_not_found() -> MessageBag {
        MessageBag::from_error(
            "Record was not found, the task was received, but \
             there is no saved record for this identifier.",
        )
    }

    /// The file extension does not map to a known conversion driver.
    pub fn extension_not_valid() -> MessageBag {
        MessageBag::from_error("Extension is not valid. Please, check the file path.")
    }

    /// The file does not exist on disk.
    pub fn file_not_found() -> MessageBag {
        MessageBag::from_error("File is not found. Please, check the file path.")
    }

    /// Conversion output directories already exist for this task.
    pub fn duplicated_transformation() -> MessageBag {
        MessageBag::from_error("Delete the previous transformation before proceed.")
    }

    /// Every candidate layer was discarded during validation.
    pub fn no_usable_layers() -> String {
        "An error has occurred in the included files. \
         Please ensure that the file contains geometries \
         or information necessary for saving."
            .to_string()
    }

    /// A referenced side-file is missing or its internal relations are broken.
    pub fn unable_to_open() -> String {
        "An error has occurred in the included files. \
         Please ensure that all necessary files have been uploaded \
         and check the internal relations between them."
            .to_string()
    }
}
