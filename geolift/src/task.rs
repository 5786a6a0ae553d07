//! Task metadata and on-disk artifact layout.
//!
//! A task is registered ahead of time by the upload tier: its store
//! entry maps the opaque task id to the uploaded file's name and
//! extension. The worker never invents tasks; a missing entry is the
//! not-found precondition.

use crate::store::{keys, SharedStore, StoreError};
use crate::tools::gdal;
use std::path::{Path, PathBuf};

/// One registered unit of ingestion work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Opaque identifier supplied by the caller or queue.
    pub id: String,
    /// Uploaded file name without extension.
    pub name: String,
    /// Uploaded file extension, lower case, without the dot.
    pub extension: String,
}

impl Task {
    /// Creates task metadata, normalizing the extension.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            extension: extension
                .into()
                .trim_start_matches('.')
                .to_lowercase(),
        }
    }

    /// Loads a task's metadata from the store.
    ///
    /// `Ok(None)` means the task was never registered or was deleted
    /// concurrently, which callers report as not-found.
    pub async fn load<S: SharedStore>(store: &S, id: &str) -> Result<Option<Task>, StoreError> {
        let entries = store.map_get_all(&keys::task_metadata(id)).await?;
        let mut name = None;
        let mut extension = None;
        for (field, value) in entries {
            match field.as_str() {
                "name" => name = Some(value),
                "extension" => extension = Some(value),
                _ => {}
            }
        }
        match (name, extension) {
            (Some(name), Some(extension)) => Ok(Some(Task::new(id, name, extension))),
            _ => Ok(None),
        }
    }

    /// Registers the task's metadata in the store.
    pub async fn register<S: SharedStore>(&self, store: &S) -> Result<(), StoreError> {
        store
            .map_set(
                &keys::task_metadata(&self.id),
                &[
                    ("name".to_string(), self.name.clone()),
                    ("extension".to_string(), self.extension.clone()),
                ],
            )
            .await
    }

    /// File name of the uploaded resource.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.extension)
    }
}

/// Per-task directory layout under the worker's workspace.
///
/// Every path of a task lives under one root, exclusively owned by the
/// task while its lease is held; rollback is a recursive delete of the
/// conversion outputs.
#[derive(Debug, Clone)]
pub struct TaskPaths {
    task_id: String,
    root: PathBuf,
}

impl TaskPaths {
    /// Lays out paths for `task_id` under `workspace`.
    pub fn new(workspace: &Path, task_id: impl Into<String>) -> Self {
        let task_id = task_id.into();
        Self {
            root: workspace.join(&task_id),
            task_id,
        }
    }

    /// The task's private directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The uploaded source file for `task`.
    pub fn source(&self, task: &Task) -> PathBuf {
        self.root.join(task.file_name())
    }

    /// Directory receiving one converted artifact per candidate layer.
    pub fn layers_dir(&self) -> PathBuf {
        self.root.join("layers")
    }

    /// Directory receiving the recombined derived resource.
    pub fn derived_dir(&self) -> PathBuf {
        self.root.join("derived")
    }

    /// Converted artifact of one layer.
    pub fn layer_artifact(&self, layer_id: &str) -> PathBuf {
        self.layers_dir()
            .join(format!("{layer_id}.{}", gdal::TARGET_EXTENSION))
    }

    /// The single derived artifact combining all surviving layers.
    pub fn derived_artifact(&self) -> PathBuf {
        self.derived_dir()
            .join(format!("{}.{}", self.task_id, gdal::TARGET_EXTENSION))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_register_then_load_round_trips() {
        let store = MemoryStore::new();
        let task = Task::new("t1", "region", "shp");
        task.register(&store).await.unwrap();

        let loaded = Task::load(&store, "t1").await.unwrap();
        assert_eq!(loaded, Some(task));
    }

    #[tokio::test]
    async fn test_unregistered_task_is_none() {
        let store = MemoryStore::new();
        assert_eq!(Task::load(&store, "ghost").await.unwrap(), None);
    }

    #[test]
    fn test_extension_is_normalized() {
        let task = Task::new("t1", "region", ".SHP");
        assert_eq!(task.extension, "shp");
        assert_eq!(task.file_name(), "region.shp");
    }

    #[test]
    fn test_paths_are_task_private() {
        let paths = TaskPaths::new(Path::new("/work"), "t1");
        assert_eq!(paths.root(), Path::new("/work/t1"));
        assert_eq!(paths.layers_dir(), Path::new("/work/t1/layers"));
        assert_eq!(
            paths.layer_artifact("abc"),
            Path::new("/work/t1/layers/abc.geojson")
        );
        assert_eq!(
            paths.derived_artifact(),
            Path::new("/work/t1/derived/t1.geojson")
        );
    }
}
