//! Worker configuration.
//!
//! Settings structs live in [`settings`], constants and computed
//! defaults in [`defaults`], INI parsing in [`parser`], serialization
//! in [`writer`], and file handling in [`file`].

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{ConfigFile, LoggingSettings, StoreSettings, WorkerSettings};
