//! Geolift - geo-spatial ingestion worker
//!
//! This library ingests geo-spatial files on behalf of an open data
//! catalog: it converts sources to GeoJSON, validates and cleans each
//! layer's schema, and records the results in a shared key-value
//! store. Workers coordinate through a leased task lock so a task is
//! processed exactly once even when deliveries overlap or a worker
//! crashes mid-run.
//!
//! # High-Level API
//!
//! The [`orchestrator`] module ties the pieces together:
//!
//! ```ignore
//! use geolift::orchestrator::JobOrchestrator;
//! use geolift::store::RedisStore;
//! use geolift::tools::ProcessRunner;
//!
//! let store = RedisStore::connect("redis://127.0.0.1:6379").await?;
//! let orchestrator = JobOrchestrator::new(store, ProcessRunner::new(), workspace);
//! let outcome = orchestrator.run("my-dataset", 0).await;
//! ```

pub mod batch;
pub mod config;
pub mod layer;
pub mod lock;
pub mod logging;
pub mod messages;
pub mod orchestrator;
pub mod parser;
pub mod store;
pub mod task;
pub mod tools;
pub mod validate;

/// Version of the geolift library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_not_empty() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_layer_module_exists() {
        use crate::layer::layer_id;
        let id = layer_id("parcels");
        assert_eq!(id.len(), 32);
    }
}
