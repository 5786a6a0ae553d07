//! Distributed lease lock over the shared store.
//!
//! The lock serializes workers contending for the same task stage. It
//! is advisory and time-bounded: the holder writes an expiry timestamp
//! as the lock value, and a contender may reclaim the key once that
//! timestamp has passed. This keeps a crashed worker from wedging a
//! task forever while still guaranteeing a single active worker during
//! the lease window.
//!
//! Reclaim is a delete followed by a fresh set-if-absent, attempted at
//! most once per acquisition. If another contender wins the re-set,
//! this worker backs off rather than looping.

use crate::store::{keys, SharedStore, StoreError};
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default lease length. Long enough to cover the store round-trips of
/// a normal stage hand-off, short enough that a crashed holder is
/// reclaimed quickly.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(21);

/// Result of one acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    /// This worker holds the lock until it releases or the lease ends.
    Acquired,
    /// Another worker holds an unexpired lease.
    HeldByOther,
    /// The protected task already reached its terminal success state;
    /// there is nothing left to do.
    AlreadyDone,
}

/// Lease lock bound to one store backend.
///
/// Cloning shares the backend; each call composes its own keys so a
/// single instance can protect any number of tasks.
#[derive(Debug, Clone)]
pub struct LeaseLock<S> {
    store: S,
    lease: Duration,
}

impl<S: SharedStore + Clone> LeaseLock<S> {
    /// Creates a lock with the default lease.
    pub fn new(store: S) -> Self {
        Self::with_lease(store, DEFAULT_LEASE)
    }

    /// Creates a lock with an explicit lease length.
    pub fn with_lease(store: S, lease: Duration) -> Self {
        Self { store, lease }
    }

    fn expiry_value(&self) -> String {
        (Utc::now().timestamp() + self.lease.as_secs() as i64).to_string()
    }

    /// Attempts to acquire the lease for `stage` of `task`.
    ///
    /// On contention the holder's expiry is inspected: a stale or
    /// unreadable lease is reclaimed with a single retry. If the lock
    /// stays contended, the task's completion marker decides between
    /// [`LockOutcome::HeldByOther`] and [`LockOutcome::AlreadyDone`].
    pub async fn acquire(&self, task: &str, stage: &str) -> Result<LockOutcome, StoreError> {
        let key = keys::lock(task, stage);

        if self.store.set_if_absent(&key, &self.expiry_value()).await? {
            debug!(task, stage, "lock acquired");
            return Ok(LockOutcome::Acquired);
        }

        if self.holder_expired(&key).await? {
            // Reclaim: delete the stale lease and race for a fresh one.
            // One attempt only; losing the race means another contender
            // reclaimed first and now holds a valid lease.
            self.store.delete(&key).await?;
            if self.store.set_if_absent(&key, &self.expiry_value()).await? {
                debug!(task, stage, "stale lock reclaimed");
                return Ok(LockOutcome::Acquired);
            }
        }

        if self.store.exists(&keys::done(task)).await? {
            // A concurrent worker resolved the task while this one was
            // blocked. The lease no longer protects anything.
            self.store.delete(&key).await?;
            debug!(task, stage, "task already completed by another worker");
            return Ok(LockOutcome::AlreadyDone);
        }

        debug!(task, stage, "lock held by another worker");
        Ok(LockOutcome::HeldByOther)
    }

    /// Releases the lease unconditionally.
    ///
    /// Called by the holder on completion and failure alike. Returns
    /// true if a lock key was actually removed.
    pub async fn release(&self, task: &str, stage: &str) -> Result<bool, StoreError> {
        let key = keys::lock(task, stage);
        let removed = self.store.delete(&key).await?;
        debug!(task, stage, removed, "lock released");
        Ok(removed)
    }

    async fn holder_expired(&self, key: &str) -> Result<bool, StoreError> {
        let Some(value) = self.store.get(key).await? else {
            // The holder released between our set attempt and this read.
            return Ok(true);
        };
        match value.trim().parse::<i64>() {
            Ok(expiry) => Ok(expiry <= Utc::now().timestamp()),
            Err(_) => {
                warn!(key, value, "unreadable lease value, treating as stale");
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const TASK: &str = "task-1";
    const STAGE: &str = "ingest";

    #[tokio::test]
    async fn test_first_acquire_wins() {
        let lock = LeaseLock::new(MemoryStore::new());
        assert_eq!(lock.acquire(TASK, STAGE).await.unwrap(), LockOutcome::Acquired);
    }

    #[tokio::test]
    async fn test_second_acquire_is_held_by_other() {
        let store = MemoryStore::new();
        let lock = LeaseLock::new(store.clone());
        let other = LeaseLock::new(store);

        assert_eq!(lock.acquire(TASK, STAGE).await.unwrap(), LockOutcome::Acquired);
        assert_eq!(
            other.acquire(TASK, STAGE).await.unwrap(),
            LockOutcome::HeldByOther
        );
    }

    #[tokio::test]
    async fn test_expired_lease_is_reclaimed() {
        let store = MemoryStore::new();
        let stale = (Utc::now().timestamp() - 60).to_string();
        store.set(&keys::lock(TASK, STAGE), &stale).await.unwrap();

        let lock = LeaseLock::new(store);
        assert_eq!(lock.acquire(TASK, STAGE).await.unwrap(), LockOutcome::Acquired);
    }

    #[tokio::test]
    async fn test_unreadable_lease_is_reclaimed() {
        let store = MemoryStore::new();
        store
            .set(&keys::lock(TASK, STAGE), "not-a-timestamp")
            .await
            .unwrap();

        let lock = LeaseLock::new(store);
        assert_eq!(lock.acquire(TASK, STAGE).await.unwrap(), LockOutcome::Acquired);
    }

    #[tokio::test]
    async fn test_completed_task_reports_already_done() {
        let store = MemoryStore::new();
        let lock = LeaseLock::new(store.clone());
        let other = LeaseLock::new(store.clone());

        assert_eq!(lock.acquire(TASK, STAGE).await.unwrap(), LockOutcome::Acquired);
        store.set(&keys::done(TASK), "1").await.unwrap();
        assert_eq!(
            other.acquire(TASK, STAGE).await.unwrap(),
            LockOutcome::AlreadyDone
        );
        // The stale lease is force-released on the way out.
        assert!(!store.exists(&keys::lock(TASK, STAGE)).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_frees_the_lock() {
        let store = MemoryStore::new();
        let lock = LeaseLock::new(store.clone());
        let other = LeaseLock::new(store);

        assert_eq!(lock.acquire(TASK, STAGE).await.unwrap(), LockOutcome::Acquired);
        assert!(lock.release(TASK, STAGE).await.unwrap());
        assert_eq!(other.acquire(TASK, STAGE).await.unwrap(), LockOutcome::Acquired);
    }

    #[tokio::test]
    async fn test_release_of_unheld_lock_is_false() {
        let lock = LeaseLock::new(MemoryStore::new());
        assert!(!lock.release(TASK, STAGE).await.unwrap());
    }

    #[tokio::test]
    async fn test_unavailable_store_propagates() {
        let store = MemoryStore::new();
        store.set_available(false);
        let lock = LeaseLock::new(store);
        assert!(lock.acquire(TASK, STAGE).await.is_err());
    }

    #[tokio::test]
    async fn test_locks_on_distinct_tasks_are_independent() {
        let store = MemoryStore::new();
        let lock = LeaseLock::new(store);
        assert_eq!(lock.acquire("t-a", STAGE).await.unwrap(), LockOutcome::Acquired);
        assert_eq!(lock.acquire("t-b", STAGE).await.unwrap(), LockOutcome::Acquired);
    }
}
