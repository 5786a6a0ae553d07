//! Registered task ingestion against the shared store.

use std::path::Path;
use std::time::Duration;

use geolift::config::ConfigFile;
use geolift::messages::TaskStatus;
use geolift::orchestrator::{JobOrchestrator, JobOutcome, SkipReason};
use geolift::store::RedisStore;
use geolift::task::{Task, TaskPaths};
use geolift::tools::ProcessRunner;
use tracing::info;

use super::common::{load_config, print_report};
use crate::error::CliError;

/// Runs the ingestion job for a registered task id.
///
/// With `once` set, a transient failure is reported instead of
/// redelivered; the printed attempt number can be fed back in.
pub async fn run(task_id: &str, attempt: u32, once: bool) -> Result<i32, CliError> {
    let config = load_config()?;
    let store = connect(&config).await?;

    let orchestrator = JobOrchestrator::new(
        store,
        ProcessRunner::new(),
        config.worker.workspace.clone(),
    )
    .with_lease(Duration::from_secs(config.worker.lease_seconds))
    .with_retry_ceiling(config.worker.retry_ceiling);

    let outcome = if once {
        orchestrator.run(task_id, attempt).await
    } else {
        orchestrator.run_with_redelivery(task_id).await
    };

    match outcome {
        JobOutcome::Finished { status, messages } => {
            print_report(&messages);
            info!(task = task_id, %status, "task finished");
            println!("Task {task_id}: {status}");
            Ok(status.code())
        }
        JobOutcome::Skipped { reason } => {
            match reason {
                SkipReason::LockedByOther => {
                    println!("Task {task_id} is being processed by another worker.");
                }
                SkipReason::StoreUnavailable => {
                    eprintln!(
                        "Task {task_id} was skipped because the shared store \
                         stayed unreachable."
                    );
                }
            }
            Ok(skip_code(reason))
        }
        JobOutcome::Retry {
            after,
            attempt,
            reason,
        } => {
            eprintln!(
                "Transient failure: {reason}. Retry with --attempt {attempt} \
                 after {}s.",
                after.as_secs()
            );
            Ok(1)
        }
        JobOutcome::Fatal { reason } => Err(CliError::Environment(reason)),
    }
}

/// Registers a task id for a local file and stages the file in the
/// worker's workspace, so `run-task` can pick it up.
pub async fn register(task_id: &str, file: &Path) -> Result<i32, CliError> {
    let config = load_config()?;

    let name = file
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| CliError::Config(format!("{} has no file name", file.display())))?;
    let extension = file
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let task = Task::new(task_id, name, extension);

    let paths = TaskPaths::new(&config.worker.workspace, task_id);
    tokio::fs::create_dir_all(paths.root())
        .await
        .map_err(|error| CliError::FileAccess {
            path: paths.root().display().to_string(),
            error,
        })?;
    tokio::fs::copy(file, paths.source(&task))
        .await
        .map_err(|error| CliError::FileAccess {
            path: file.display().to_string(),
            error,
        })?;

    let store = connect(&config).await?;
    task.register(&store)
        .await
        .map_err(|e| CliError::Store(e.to_string()))?;

    println!("Registered task {task_id} for {}", task.file_name());
    Ok(TaskStatus::Success.code())
}

/// Contention is a normal scheduling outcome and exits clean; an
/// unreachable store means the task was never looked at.
fn skip_code(reason: SkipReason) -> i32 {
    match reason {
        SkipReason::LockedByOther => TaskStatus::Success.code(),
        SkipReason::StoreUnavailable => TaskStatus::NotFound.code(),
    }
}

async fn connect(config: &ConfigFile) -> Result<RedisStore, CliError> {
    RedisStore::connect(&config.store.url)
        .await
        .map_err(|e| CliError::Store(e.to_string()))
}
