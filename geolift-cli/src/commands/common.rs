//! Common helpers shared across CLI commands.

use crate::error::CliError;
use geolift::config::ConfigFile;
use geolift::messages::{headers, MessageBag, TaskStatus};
use geolift::tools::{ProcessRunner, ToolRunner};

/// Loads the worker configuration, mapping failures to CLI errors.
pub fn load_config() -> Result<ConfigFile, CliError> {
    ConfigFile::load().map_err(|e| CliError::Config(e.to_string()))
}

/// Builds the process runner used by standalone commands, checking
/// the external toolchain first.
pub async fn ready_runner() -> Result<ProcessRunner, CliError> {
    let runner = ProcessRunner::new();
    runner
        .preflight()
        .await
        .map_err(|e| CliError::Environment(e.to_string()))?;
    Ok(runner)
}

/// Prints a message bag section by section, errors first.
///
/// Empty sections are omitted entirely so a clean run prints nothing
/// but its information lines.
pub fn print_report(bag: &MessageBag) {
    print_section(headers::ERRORS, "ERROR", &bag.error);
    print_section(headers::WARNINGS, "WARN", &bag.warn);
    print_section(headers::INFORMATION, "INFO", &bag.info);
}

fn print_section(header: &str, level: &str, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    println!("{header}");
    for line in lines {
        println!(" * [{level}] {line}");
    }
}

/// Prints a report and returns the exit code for its status.
pub fn report_and_code(bag: &MessageBag) -> i32 {
    print_report(bag);
    if bag.has_errors() {
        TaskStatus::Failure.code()
    } else {
        TaskStatus::Success.code()
    }
}
