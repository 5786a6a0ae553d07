//! Top-level task orchestration.
//!
//! The orchestrator owns the task and lock lifecycle: it verifies the
//! environment, takes the lease, checks the metadata precondition,
//! clears leftovers of a prior crashed attempt, delegates to the batch
//! processor, and persists the results. Every path out of a run
//! releases the lease.
//!
//! Two failure families are kept strictly apart: the task's data being
//! broken (terminal, status persisted, artifacts rolled back) and the
//! worker's environment being broken (nothing persisted, the caller is
//! asked to redeliver after a backoff).

use crate::batch::{BatchError, BatchOutcome, LayerBatchProcessor};
use crate::lock::{LeaseLock, LockOutcome};
use crate::messages::{canned, MessageBag, TaskStatus};
use crate::store::{keys, SharedStore, StoreError};
use crate::task::{Task, TaskPaths};
use crate::tools::ToolRunner;
use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

/// Stage name protected by the lease.
pub const STAGE: &str = "ingest";

/// Default redelivery attempts before an environment failure is fatal.
pub const RETRY_CEILING: u32 = 5;

/// Linear backoff step between redeliveries.
const BACKOFF_STEP: Duration = Duration::from_secs(20);

/// Why a run was skipped without touching the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another worker holds an unexpired lease.
    LockedByOther,
    /// The shared store could not be reached.
    StoreUnavailable,
}

/// Terminal result of one orchestration attempt.
#[derive(Debug)]
pub enum JobOutcome {
    /// The task reached a terminal state and it was persisted.
    Finished {
        /// Final status code.
        status: TaskStatus,
        /// Aggregated operator messages.
        messages: MessageBag,
    },
    /// Nothing was done and nothing persisted.
    Skipped {
        /// Why the run stepped aside.
        reason: SkipReason,
    },
    /// The environment is broken; redeliver after the backoff.
    Retry {
        /// How long the caller should wait before redelivering.
        after: Duration,
        /// Attempt number to pass back in.
        attempt: u32,
        /// Human-readable cause.
        reason: String,
    },
    /// The environment stayed broken past the retry ceiling.
    Fatal {
        /// Human-readable cause.
        reason: String,
    },
}

/// Drives tasks through the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct JobOrchestrator<S, R> {
    store: S,
    lock: LeaseLock<S>,
    processor: LayerBatchProcessor<R>,
    runner: R,
    workspace: PathBuf,
    retry_ceiling: u32,
}

impl<S, R> JobOrchestrator<S, R>
where
    S: SharedStore + Clone,
    R: ToolRunner + Clone,
{
    /// Creates an orchestrator over the given store, runner, and
    /// workspace directory.
    pub fn new(store: S, runner: R, workspace: PathBuf) -> Self {
        Self {
            lock: LeaseLock::new(store.clone()),
            processor: LayerBatchProcessor::new(runner.clone()),
            store,
            runner,
            workspace,
            retry_ceiling: RETRY_CEILING,
        }
    }

    /// Overrides the lease length, mainly for tests.
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lock = LeaseLock::with_lease(self.store.clone(), lease);
        self
    }

    /// Overrides the redelivery ceiling for transient failures.
    pub fn with_retry_ceiling(mut self, ceiling: u32) -> Self {
        self.retry_ceiling = ceiling;
        self
    }

    /// Runs one orchestration attempt for `task_id`.
    ///
    /// `attempt` counts prior deliveries of this task id; it selects
    /// the backoff for transient failures and enforces the ceiling.
    pub async fn run(&self, task_id: &str, attempt: u32) -> JobOutcome {
        if let Err(e) = self.runner.preflight().await {
            return self.transient(attempt, format!("environment not ready: {e}"));
        }

        let acquired = match self.lock.acquire(task_id, STAGE).await {
            Ok(outcome) => outcome,
            Err(e) => return self.store_unavailable(attempt, e),
        };
        match acquired {
            LockOutcome::Acquired => {}
            LockOutcome::HeldByOther => {
                warn!(task = task_id, "skipped, locked by another worker");
                return JobOutcome::Skipped {
                    reason: SkipReason::LockedByOther,
                };
            }
            LockOutcome::AlreadyDone => {
                info!(task = task_id, "already finished by another worker");
                return JobOutcome::Finished {
                    status: TaskStatus::AlreadyDone,
                    messages: MessageBag::new(),
                };
            }
        }

        let outcome = self.run_locked(task_id, attempt).await;
        if let Err(e) = self.lock.release(task_id, STAGE).await {
            error!(task = task_id, error = %e, "could not release lease");
        }
        outcome
    }

    /// Runs attempts with internal redelivery until a terminal outcome.
    ///
    /// This is the loop a queue consumer would otherwise provide; the
    /// CLI uses it directly.
    pub async fn run_with_redelivery(&self, task_id: &str) -> JobOutcome {
        let mut attempt = 0;
        loop {
            match self.run(task_id, attempt).await {
                JobOutcome::Retry {
                    after,
                    attempt: next,
                    reason,
                } => {
                    warn!(task = task_id, ?after, reason, "redelivering after backoff");
                    tokio::time::sleep(after).await;
                    attempt = next;
                }
                terminal => return terminal,
            }
        }
    }

    /// The lease-protected middle of a run.
    async fn run_locked(&self, task_id: &str, attempt: u32) -> JobOutcome {
        // A completed task may be redelivered after its lease expired;
        // the completion marker, not the lock, is the exactly-once
        // authority.
        match self.store.exists(&keys::done(task_id)).await {
            Ok(true) => {
                info!(task = task_id, "already completed, nothing to do");
                return JobOutcome::Finished {
                    status: TaskStatus::AlreadyDone,
                    messages: MessageBag::new(),
                };
            }
            Ok(false) => {}
            Err(e) => return self.store_unavailable(attempt, e),
        }

        let task = match Task::load(&self.store, task_id).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                // Never registered or deleted concurrently. No cleanup:
                // the lock-protected resource was never touched.
                let messages = canned::record_not_found();
                if let Err(e) = self.persist_failure(task_id, TaskStatus::NotFound, &messages).await
                {
                    return self.store_unavailable(attempt, e);
                }
                return JobOutcome::Finished {
                    status: TaskStatus::NotFound,
                    messages,
                };
            }
            Err(e) => return self.store_unavailable(attempt, e),
        };

        let paths = TaskPaths::new(&self.workspace, task_id);
        if let Err(e) = self.cleanup_artifacts(&paths).await {
            return self.transient(attempt, format!("cannot clear prior artifacts: {e}"));
        }

        let source = paths.source(&task);
        match self.processor.process(&task, &source, &paths).await {
            Ok(outcome) => match self.commit(task_id, &outcome).await {
                Ok(()) => JobOutcome::Finished {
                    status: TaskStatus::Success,
                    messages: outcome.messages,
                },
                Err(e) => self.store_unavailable(attempt, e),
            },
            Err(BatchError::Tool(e)) => {
                self.transient(attempt, format!("tool unavailable: {e}"))
            }
            Err(BatchError::Failed(messages)) => {
                // Compensating rollback: no partial artifacts survive a
                // failed task.
                if let Err(e) = self.cleanup_artifacts(&paths).await {
                    warn!(task = task_id, error = %e, "rollback left artifacts behind");
                }
                if let Err(e) = self.persist_failure(task_id, TaskStatus::Failure, &messages).await
                {
                    return self.store_unavailable(attempt, e);
                }
                JobOutcome::Finished {
                    status: TaskStatus::Failure,
                    messages,
                }
            }
        }
    }

    /// Persists everything a successful batch produced.
    async fn commit(&self, task_id: &str, outcome: &BatchOutcome) -> Result<(), StoreError> {
        // A crashed attempt may have written some layer records before
        // the completion marker; clear them so none go stale.
        for key in self
            .store
            .scan_prefix(&keys::layer_prefix(task_id))
            .await?
        {
            self.store.delete(&key).await?;
        }

        for layer in outcome.surviving() {
            self.store
                .set(&keys::layer_name(task_id, &layer.id), &layer.original_name)
                .await?;

            let mut info = layer.properties.to_store_map();
            let duplicated: Vec<&str> = layer
                .duplicated_values
                .iter()
                .filter(|(_, dup)| **dup)
                .map(|(field, _)| field.as_str())
                .collect();
            if !duplicated.is_empty() {
                info.push(("duplicated".to_string(), duplicated.join(",")));
            }
            self.store
                .map_set(&keys::layer_info(task_id, &layer.id), &info)
                .await?;

            let fields: Vec<(String, String)> = layer
                .fields
                .iter()
                .map(|(name, field_type)| (name.clone(), field_type.name().to_string()))
                .collect();
            self.store
                .map_set(&keys::layer_fields(task_id, &layer.id), &fields)
                .await?;
        }

        self.persist_messages(task_id, &outcome.messages).await?;
        self.persist_status(task_id, TaskStatus::Success).await?;
        self.store
            .set(&keys::done(task_id), &Utc::now().timestamp().to_string())
            .await?;
        info!(
            task = task_id,
            layers = outcome.surviving().count(),
            "task committed"
        );
        Ok(())
    }

    async fn persist_failure(
        &self,
        task_id: &str,
        status: TaskStatus,
        messages: &MessageBag,
    ) -> Result<(), StoreError> {
        self.persist_messages(task_id, messages).await?;
        self.persist_status(task_id, status).await
    }

    /// Appends message logs, one list per kind. Lines are trimmed and
    /// blank lines dropped so the persisted logs stay greppable.
    async fn persist_messages(
        &self,
        task_id: &str,
        messages: &MessageBag,
    ) -> Result<(), StoreError> {
        let kinds = [
            ("info", &messages.info),
            ("warn", &messages.warn),
            ("error", &messages.error),
        ];
        for (kind, list) in kinds {
            let cleaned: Vec<String> = list
                .iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
            self.store
                .append(&keys::messages(task_id, kind), &cleaned)
                .await?;
        }
        Ok(())
    }

    async fn persist_status(&self, task_id: &str, status: TaskStatus) -> Result<(), StoreError> {
        self.store
            .append(
                &keys::status(task_id),
                &[format!("{STAGE}:{}", status.code())],
            )
            .await
    }

    /// Removes conversion outputs of a prior attempt. The uploaded
    /// source file is left in place so a retry can reconvert it.
    async fn cleanup_artifacts(&self, paths: &TaskPaths) -> Result<(), std::io::Error> {
        for dir in [paths.layers_dir(), paths.derived_dir()] {
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn transient(&self, attempt: u32, reason: String) -> JobOutcome {
        if attempt >= self.retry_ceiling {
            error!(reason, "environment failure past retry ceiling");
            return JobOutcome::Fatal { reason };
        }
        JobOutcome::Retry {
            after: BACKOFF_STEP * (attempt + 1),
            attempt: attempt + 1,
            reason,
        }
    }

    fn store_unavailable(&self, attempt: u32, e: StoreError) -> JobOutcome {
        if attempt >= self.retry_ceiling {
            error!(error = %e, "shared store unavailable past retry ceiling");
            return JobOutcome::Skipped {
                reason: SkipReason::StoreUnavailable,
            };
        }
        JobOutcome::Retry {
            after: BACKOFF_STEP * (attempt + 1),
            attempt: attempt + 1,
            reason: format!("shared store unavailable: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::tools::{ToolError, ToolOutput};

    /// Runner for paths that must never reach a tool: any invocation
    /// is a test failure.
    #[derive(Clone)]
    struct NoToolRunner;

    impl ToolRunner for NoToolRunner {
        async fn run(&self, executable: &str, args: &[String]) -> Result<ToolOutput, ToolError> {
            panic!("unexpected tool invocation: {executable} {args:?}");
        }

        async fn preflight(&self) -> Result<(), crate::tools::env::EnvError> {
            Ok(())
        }
    }

    fn orchestrator(store: MemoryStore) -> JobOrchestrator<MemoryStore, NoToolRunner> {
        JobOrchestrator::new(store, NoToolRunner, std::env::temp_dir())
    }

    #[tokio::test]
    async fn test_unregistered_task_finishes_not_found() {
        let store = MemoryStore::new();
        let orchestrator = orchestrator(store.clone());

        let outcome = orchestrator.run("ghost", 0).await;
        match outcome {
            JobOutcome::Finished { status, messages } => {
                assert_eq!(status, TaskStatus::NotFound);
                assert!(messages.has_errors());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        // The status history records the short circuit.
        let history = store.list(&keys::status("ghost")).await.unwrap();
        assert_eq!(history, vec!["ingest:1"]);
        // No layer metadata was written.
        assert!(store
            .scan_prefix(&keys::layer_prefix("ghost"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_store_outage_asks_for_redelivery() {
        let store = MemoryStore::new();
        let orchestrator = orchestrator(store.clone());
        store.set_available(false);

        match orchestrator.run("t1", 0).await {
            JobOutcome::Retry { attempt, after, .. } => {
                assert_eq!(attempt, 1);
                assert_eq!(after, Duration::from_secs(20));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_contended_lock_skips_without_touching_the_store() {
        let store = MemoryStore::new();
        let orchestrator = orchestrator(store.clone());

        let other = LeaseLock::new(store.clone());
        assert_eq!(
            other.acquire("t2", STAGE).await.unwrap(),
            LockOutcome::Acquired
        );

        match orchestrator.run("t2", 0).await {
            JobOutcome::Skipped { reason } => assert_eq!(reason, SkipReason::LockedByOther),
            other => panic!("unexpected outcome: {other:?}"),
        }
        // No metadata, status, or messages were written for the task.
        assert!(store.list(&keys::status("t2")).await.unwrap().is_empty());
        assert!(store
            .list(&keys::messages("t2", "error"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_completed_task_reports_already_done() {
        let store = MemoryStore::new();
        let orchestrator = orchestrator(store.clone());

        let other = LeaseLock::new(store.clone());
        assert_eq!(
            other.acquire("t3", STAGE).await.unwrap(),
            LockOutcome::Acquired
        );
        store
            .set(&keys::done("t3"), &Utc::now().timestamp().to_string())
            .await
            .unwrap();

        match orchestrator.run("t3", 0).await {
            JobOutcome::Finished { status, .. } => {
                assert_eq!(status, TaskStatus::AlreadyDone);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_backoff_grows_linearly_to_a_ceiling() {
        let store = MemoryStore::new();
        let orchestrator = orchestrator(store.clone());
        store.set_available(false);

        match orchestrator.run("t1", 2).await {
            JobOutcome::Retry { after, .. } => assert_eq!(after, Duration::from_secs(60)),
            other => panic!("unexpected outcome: {other:?}"),
        }
        match orchestrator.run("t1", RETRY_CEILING).await {
            JobOutcome::Skipped { reason } => {
                assert_eq!(reason, SkipReason::StoreUnavailable);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_configured_retry_ceiling_is_honored() {
        let store = MemoryStore::new();
        let orchestrator = orchestrator(store.clone()).with_retry_ceiling(1);
        store.set_available(false);

        match orchestrator.run("t1", 0).await {
            JobOutcome::Retry { attempt, .. } => assert_eq!(attempt, 1),
            other => panic!("unexpected outcome: {other:?}"),
        }
        match orchestrator.run("t1", 1).await {
            JobOutcome::Skipped { reason } => {
                assert_eq!(reason, SkipReason::StoreUnavailable);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_persisted_messages_are_trimmed() {
        let store = MemoryStore::new();
        let orchestrator = orchestrator(store.clone());

        let mut bag = MessageBag::new();
        bag.info.push("  padded  ".to_string());
        bag.info.push("\n".to_string());
        bag.warn.push("kept".to_string());
        orchestrator.persist_messages("t1", &bag).await.unwrap();

        assert_eq!(
            store.list(&keys::messages("t1", "info")).await.unwrap(),
            vec!["padded"]
        );
        assert_eq!(
            store.list(&keys::messages("t1", "warn")).await.unwrap(),
            vec!["kept"]
        );
        assert!(store
            .list(&keys::messages("t1", "error"))
            .await
            .unwrap()
            .is_empty());
    }
}
