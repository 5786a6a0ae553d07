//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

/// Complete worker configuration loaded from config.ini.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    /// Worker settings
    pub worker: WorkerSettings,
    /// Shared store settings
    pub store: StoreSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Directory holding per-task artifact directories
    pub workspace: PathBuf,
    /// Lease length in seconds for the task lock
    pub lease_seconds: u64,
    /// Redelivery attempts before an environment failure is fatal
    pub retry_ceiling: u32,
}

/// Shared store configuration.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Store connection URL, e.g. redis://127.0.0.1:6379
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Log level filter: trace, debug, info, warn, or error
    pub level: String,
    /// Log file directory; stdout only when unset
    pub directory: Option<PathBuf>,
}
