//! Standalone ETL runs for job and transformation definitions.

use std::path::Path;

use geolift::messages::{headers, TaskStatus};
use geolift::tools::etl::run_definition;
use geolift::tools::ProcessRunner;

use super::common::print_report;
use crate::error::CliError;

/// Runs an ETL definition (job or transformation) and reports its
/// outcome. The raw engine log is written next to the definition.
pub async fn run(path: &Path) -> Result<i32, CliError> {
    // Engines resolve relative resources against their working
    // directory, so run where the definition lives.
    let runner = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => ProcessRunner::in_dir(parent),
        None => ProcessRunner::new(),
    };

    let bag = run_definition(&runner, path)
        .await
        .map_err(|e| CliError::Environment(e.to_string()))?;

    // Performance counters come back as info lines; give them their
    // own section so operators can grep them.
    let (stats, info): (Vec<String>, Vec<String>) = bag
        .info
        .iter()
        .cloned()
        .partition(|line| line.starts_with("Performance by "));

    let mut report = bag.clone();
    report.info = info;
    print_report(&report);

    if !stats.is_empty() {
        println!("{}", headers::STATS);
        for line in &stats {
            println!(" * {line}");
        }
    }

    if bag.has_errors() {
        Ok(TaskStatus::Failure.code())
    } else {
        Ok(TaskStatus::Success.code())
    }
}
