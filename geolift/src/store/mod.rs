//! Shared key-value store boundary.
//!
//! The store is the sole durable owner of all persisted state: task
//! metadata, per-layer information, message logs, status history, and
//! the lease keys used by the distributed lock. Two implementations are
//! provided:
//!
//! - [`MemoryStore`] — process-local, for tests and single-node runs.
//! - [`RedisStore`] — the production backend.
//!
//! All writes are keyed by task id (or `task:stage`), so concurrent
//! workers on distinct tasks never conflict; the lease in
//! [`crate::lock`] guarantees writers for the *same* task never run
//! concurrently.

pub mod keys;
mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use std::future::Future;
use thiserror::Error;

/// Errors talking to the shared store.
///
/// Any of these means the store is unreachable or misbehaving — never
/// that a key was merely absent. Absence is expressed through `Option`
/// and `bool` results.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store could not be reached at all.
    #[error("shared store unavailable: {0}")]
    Unavailable(String),

    /// A single command failed after a connection was established.
    #[error("shared store command failed: {0}")]
    Command(String),
}

/// Abstract key-value store with the primitive operations the worker
/// needs: atomic set-if-absent (lock substrate), plain get/set/delete,
/// ordered lists (message logs, status history), and field maps
/// (task and layer metadata).
pub trait SharedStore: Send + Sync + 'static {
    /// Reads a plain string value.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Writes a plain string value.
    fn set(&self, key: &str, value: &str)
        -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Atomically sets `key` only if it does not exist.
    ///
    /// Returns true if the value was written.
    fn set_if_absent(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Deletes a key. Returns true if a key was removed.
    fn delete(&self, key: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Returns true if the key exists.
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Appends values to the ordered list at `key`.
    fn append(
        &self,
        key: &str,
        values: &[String],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Reads the whole ordered list at `key` (empty if absent).
    fn list(&self, key: &str) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// Writes field/value pairs into the map at `key`.
    fn map_set(
        &self,
        key: &str,
        entries: &[(String, String)],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Reads every field/value pair from the map at `key`.
    fn map_get_all(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Vec<(String, String)>, StoreError>> + Send;

    /// Lists every key starting with `prefix`.
    fn scan_prefix(
        &self,
        prefix: &str,
    ) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// Round-trips a liveness probe.
    fn ping(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
