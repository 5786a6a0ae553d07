//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (init, path, list)
//! - [`etl`] - Standalone ETL job and transformation runs
//! - [`file`] - Standalone file operations (convert, inspect, fields)
//! - [`task`] - Registered task ingestion against the shared store

pub mod common;
pub mod config;
pub mod etl;
pub mod file;
pub mod task;
