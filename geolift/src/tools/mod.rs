//! Subprocess boundary to the external toolchains.
//!
//! The worker never links GIS libraries; it shells out to the
//! conversion/inspection binaries and the ETL engine and scrapes their
//! textual output. [`ToolRunner`] is the seam: production code uses
//! [`ProcessRunner`], tests substitute a fake that returns canned
//! output and writes canned artifacts.
//!
//! No structured error crosses this boundary. A tool that ran but
//! reported problems does so through its stdout/stderr text, which
//! [`crate::parser`] interprets; only failure to launch the process at
//! all is a [`ToolError`].

pub mod env;
pub mod etl;
pub mod gdal;

use std::future::Future;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Raw output of one tool invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Captured standard output, lossily decoded.
    pub stdout: String,
    /// Captured standard error, lossily decoded.
    pub stderr: String,
    /// Process exit code, when the OS reported one.
    pub status: Option<i32>,
}

/// The tool process could not be launched.
///
/// This is an environment problem (missing binary, broken PATH), never
/// a statement about the task's data, so the orchestrator treats it as
/// transient and retryable.
#[derive(Debug, Clone, Error)]
#[error("failed to run {executable}: {message}")]
pub struct ToolError {
    /// The executable that could not be launched.
    pub executable: String,
    /// OS-level detail.
    pub message: String,
}

/// Runs external executables and captures their output.
pub trait ToolRunner: Send + Sync + 'static {
    /// Runs `executable` with `args`, waiting for completion.
    fn run(
        &self,
        executable: &str,
        args: &[String],
    ) -> impl Future<Output = Result<ToolOutput, ToolError>> + Send;

    /// Verifies the toolchains this runner will invoke are available
    /// and recent enough. Fakes override this to skip the PATH probe.
    fn preflight(&self) -> impl Future<Output = Result<(), env::EnvError>> + Send
    where
        Self: Sized,
    {
        env::check_environment(self)
    }
}

/// Production [`ToolRunner`] spawning real subprocesses.
///
/// Commands run with an optional working directory, inherit the
/// worker's environment (the preflight in [`env`] has already checked
/// PATH), and never receive stdin.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    working_dir: Option<std::path::PathBuf>,
}

impl ProcessRunner {
    /// Creates a runner executing in the worker's current directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a runner executing in `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            working_dir: Some(dir.as_ref().to_path_buf()),
        }
    }
}

impl ToolRunner for ProcessRunner {
    async fn run(&self, executable: &str, args: &[String]) -> Result<ToolOutput, ToolError> {
        debug!(executable, ?args, "running external tool");
        let mut command = Command::new(executable);
        command.args(args).stdin(std::process::Stdio::null());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        let output = command.output().await.map_err(|e| ToolError {
            executable: executable.to_string(),
            message: e.to_string(),
        })?;
        Ok(ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: output.status.code(),
        })
    }
}
