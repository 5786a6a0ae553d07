//! Standalone file operations: convert, inspect, fields.
//!
//! These commands run the geo toolchain directly against a local file
//! without touching the shared store, for operators checking an
//! upload before (or instead of) queueing it.

use std::path::Path;

use geolift::batch::{BatchError, LayerBatchProcessor};
use geolift::messages::{headers, MessageBag, TaskStatus};
use geolift::parser;
use geolift::task::{Task, TaskPaths};
use geolift::tools::{gdal, ToolRunner};

use super::common::{print_report, ready_runner, report_and_code};
use crate::error::CliError;

/// Runs the full conversion and validation batch for a local file.
///
/// Artifacts land next to the source, under a directory named after
/// the file stem.
pub async fn convert(path: &Path) -> Result<i32, CliError> {
    let runner = ready_runner().await?;
    let task = task_for(path)?;
    let workspace = path.parent().unwrap_or_else(|| Path::new("."));
    let paths = TaskPaths::new(workspace, task.id.clone());

    let processor = LayerBatchProcessor::new(runner);
    match processor.process(&task, path, &paths).await {
        Ok(outcome) => {
            print_report(&outcome.messages);
            println!(
                "Derived resource: {}",
                paths.derived_artifact().display()
            );
            Ok(TaskStatus::Success.code())
        }
        Err(BatchError::Tool(e)) => Err(CliError::Environment(e.to_string())),
        Err(BatchError::Failed(messages)) => {
            print_report(&messages);
            Ok(TaskStatus::Failure.code())
        }
    }
}

/// Inspects a local file and prints its layer properties.
pub async fn inspect(path: &Path) -> Result<i32, CliError> {
    let runner = ready_runner().await?;
    let output = runner
        .run(gdal::INSPECT_TOOL, &gdal::inspect_args(path))
        .await
        .map_err(|e| CliError::Environment(e.to_string()))?;
    let bag = parser::gdal::parse(&output.stdout, &output.stderr);
    Ok(report_and_code(&bag))
}

/// Inspects a local file and prints its field schema.
pub async fn fields(path: &Path) -> Result<i32, CliError> {
    let runner = ready_runner().await?;
    let output = runner
        .run(gdal::INSPECT_TOOL, &gdal::inspect_args(path))
        .await
        .map_err(|e| CliError::Environment(e.to_string()))?;
    let bag = parser::gdal::parse(&output.stdout, &output.stderr);
    if bag.has_errors() {
        let mut errors = MessageBag::new();
        errors.error = bag.error;
        print_report(&errors);
        return Ok(TaskStatus::Failure.code());
    }

    let schema = parser::gdal::extract_fields(&bag.info);
    println!("{}", headers::FIELDS);
    for (field, field_type) in &schema {
        println!(" * {field}: {field_type}");
    }
    Ok(TaskStatus::Success.code())
}

/// Derives ad hoc task metadata from a file path.
fn task_for(path: &Path) -> Result<Task, CliError> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| CliError::Config(format!("{} has no file name", path.display())))?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    Ok(Task::new(stem, stem, extension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_task_for_splits_stem_and_extension() {
        let task = task_for(&PathBuf::from("/data/Parcels.SHP")).unwrap();
        assert_eq!(task.id, "Parcels");
        assert_eq!(task.extension, "shp");
    }

    #[test]
    fn test_task_for_rejects_bare_root() {
        assert!(task_for(&PathBuf::from("/")).is_err());
    }
}
