//! Configuration management CLI commands.
//!
//! Provides `config init`, `config path`, and `config list` for
//! creating and viewing the worker configuration.

use clap::Subcommand;
use geolift::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Create the default config file if it doesn't exist
    Init,

    /// Show the configuration file path
    Path,

    /// List the effective configuration settings
    List,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<i32, CliError> {
    match command {
        ConfigCommands::Init => {
            let path = ConfigFile::ensure_exists().map_err(|e| CliError::Config(e.to_string()))?;
            println!("Configuration file: {}", path.display());
        }
        ConfigCommands::Path => {
            println!("{}", config_file_path().display());
        }
        ConfigCommands::List => {
            let config = ConfigFile::load().map_err(|e| CliError::Config(e.to_string()))?;
            println!("worker.workspace = {}", config.worker.workspace.display());
            println!("worker.lease_seconds = {}", config.worker.lease_seconds);
            println!("worker.retry_ceiling = {}", config.worker.retry_ceiling);
            println!("store.url = {}", config.store.url);
            println!("logging.level = {}", config.logging.level);
            println!(
                "logging.directory = {}",
                config
                    .logging
                    .directory
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            );
        }
    }
    Ok(0)
}
