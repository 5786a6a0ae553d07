//! Logging infrastructure for geolift.
//!
//! Provides structured logging with optional file output:
//! - Always prints to stdout for CLI tailing
//! - Writes to `geolift.log` in the configured directory when one is set
//! - Configurable via the `[logging]` config section, overridable with
//!   the RUST_LOG environment variable

use crate::config::LoggingSettings;
use std::fs;
use std::io;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Log file name used when a log directory is configured.
pub const LOG_FILE: &str = "geolift.log";

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard will flush and close the log file writer.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the logging system from configuration.
///
/// Sets up a stdout layer always, and a file layer writing to
/// `geolift.log` when `settings.directory` is set. RUST_LOG takes
/// precedence over the configured level when present.
///
/// # Errors
///
/// Returns error if the log directory cannot be created.
pub fn init_logging(settings: &LoggingSettings) -> Result<LoggingGuard, io::Error> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.clone()));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_ansi(true)
        .with_target(false);

    let mut file_guard = None;
    let file_layer = match &settings.directory {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let file_appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
            file_guard = Some(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(non_blocking_file)
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_name() {
        assert_eq!(LOG_FILE, "geolift.log");
    }

    #[test]
    fn test_creates_log_directory() {
        // Can't call init_logging twice per process, so exercise the
        // directory handling directly.
        let temp_dir = tempfile::TempDir::new().unwrap();
        let log_dir = temp_dir.path().join("logs/nested");

        fs::create_dir_all(&log_dir).expect("Failed to create directory");
        let log_path = log_dir.join(LOG_FILE);
        fs::write(&log_path, "").expect("Failed to create log file");

        assert!(log_path.exists());
    }

    #[test]
    fn test_guard_structure() {
        use tracing_appender::non_blocking::NonBlocking;

        let (non_blocking, guard) = NonBlocking::new(std::io::sink());
        drop(non_blocking);

        let _logging_guard = LoggingGuard {
            _file_guard: Some(guard),
        };
    }
}
