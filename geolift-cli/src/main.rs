//! Geolift CLI - command-line interface to the ingestion worker.
//!
//! Standalone commands (`convert`, `inspect`, `list-fields`, `run-job`,
//! `run-transform`) operate on local files without the shared store;
//! `register` and `run-task` drive the full coordinated pipeline.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;
mod error;

use commands::config::ConfigCommands;
use error::CliError;

#[derive(Parser)]
#[command(name = "geolift")]
#[command(version = geolift::VERSION)]
#[command(about = "Geo-spatial ingestion worker", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a local geo file and validate its layers
    Convert {
        /// Path of the source file (shp, geojson, json, gml, kml)
        path: PathBuf,
    },

    /// Print the layer properties of a local geo file
    Inspect {
        /// Path of the source file
        path: PathBuf,
    },

    /// Print the field schema of a local geo file
    ListFields {
        /// Path of the source file
        path: PathBuf,
    },

    /// Run an ETL job definition (.kjb)
    RunJob {
        /// Path of the job definition
        path: PathBuf,
    },

    /// Run an ETL transformation definition (.ktr)
    RunTransform {
        /// Path of the transformation definition
        path: PathBuf,
    },

    /// Register a task id for a local file in the shared store
    Register {
        /// Task identifier
        id: String,
        /// File to stage into the worker's workspace
        file: PathBuf,
    },

    /// Run the ingestion job for a registered task id
    RunTask {
        /// Task identifier
        id: String,
        /// Prior delivery count, used for backoff
        #[arg(long, default_value_t = 0)]
        attempt: u32,
        /// Run a single attempt instead of redelivering internally
        #[arg(long)]
        once: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match geolift::config::ConfigFile::load() {
        Ok(config) => config,
        Err(e) => CliError::Config(e.to_string()).exit(),
    };
    let _logging_guard = match geolift::logging::init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => CliError::LoggingInit(e.to_string()).exit(),
    };

    let result = match args.command {
        Commands::Convert { path } => commands::file::convert(&path).await,
        Commands::Inspect { path } => commands::file::inspect(&path).await,
        Commands::ListFields { path } => commands::file::fields(&path).await,
        Commands::RunJob { path } | Commands::RunTransform { path } => {
            commands::etl::run(&path).await
        }
        Commands::Register { id, file } => commands::task::register(&id, &file).await,
        Commands::RunTask { id, attempt, once } => {
            commands::task::run(&id, attempt, once).await
        }
        Commands::Config { command } => commands::config::run(command),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => e.exit(),
    }
}
