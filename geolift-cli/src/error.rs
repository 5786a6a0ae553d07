//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent
//! formatting and appropriate exit codes.

use std::fmt;
use std::process;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Shared store unreachable or misbehaving
    Store(String),
    /// Required external tooling missing or too old
    Environment(String),
    /// Failed to read or copy an input file
    FileAccess { path: String, error: std::io::Error },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        // Print additional help for specific errors
        match self {
            CliError::Store(_) => {
                eprintln!();
                eprintln!("Make sure the shared store is reachable:");
                eprintln!("  1. Check that the store service is running");
                eprintln!("  2. Check store.url in config.ini (geolift config path)");
            }
            CliError::Environment(_) => {
                eprintln!();
                eprintln!("The worker needs GDAL (ogr2ogr, ogrinfo) on PATH,");
                eprintln!("with every executable of a toolchain in one directory.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Store(msg) => write!(f, "Shared store error: {}", msg),
            CliError::Environment(msg) => write!(f, "Environment not ready: {}", msg),
            CliError::FileAccess { path, error } => {
                write!(f, "Cannot access {}: {}", path, error)
            }
        }
    }
}
