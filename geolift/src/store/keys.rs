//! Key composition for everything the worker persists.
//!
//! All keys are namespaced by purpose so one store instance can serve
//! several deployments without numbered databases. Changing any scheme
//! here is a wire-format change for every reader of the store.

/// Lease key protecting `stage` of `task`.
pub fn lock(task: &str, stage: &str) -> String {
    format!("tasks:{task}:{stage}")
}

/// Marker set once a task has reached its terminal success state.
pub fn done(task: &str) -> String {
    format!("mapping:{task}")
}

/// Status history list for a task. Entries are `stage:code`.
pub fn status(task: &str) -> String {
    format!("status:{task}")
}

/// Message log list for one kind (`info`, `warn`, `error`) of a task.
pub fn messages(task: &str, kind: &str) -> String {
    format!("messages:{task}-{kind}")
}

/// Task metadata map (`name`, `extension`).
pub fn task_metadata(task: &str) -> String {
    format!("files:{task}")
}

/// Human-readable original name of one layer.
pub fn layer_name(task: &str, layer_id: &str) -> String {
    format!("files:{task}:layer:{layer_id}:name")
}

/// Properties map of one layer (`geometry`, `features`, `bounding`, `crs`).
pub fn layer_info(task: &str, layer_id: &str) -> String {
    format!("files:{task}:layer:{layer_id}:info")
}

/// Field schema map of one layer (field name to normalized type).
pub fn layer_fields(task: &str, layer_id: &str) -> String {
    format!("files:{task}:layer:{layer_id}:fields")
}

/// Prefix matching every per-layer key of a task.
pub fn layer_prefix(task: &str) -> String {
    format!("files:{task}:layer:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_namespaced_per_task() {
        assert_eq!(lock("t1", "ingest"), "tasks:t1:ingest");
        assert_eq!(status("t1"), "status:t1");
        assert_eq!(messages("t1", "error"), "messages:t1-error");
        assert_eq!(task_metadata("t1"), "files:t1");
        assert_eq!(done("t1"), "mapping:t1");
    }

    #[test]
    fn test_layer_keys_share_the_scan_prefix() {
        let name = layer_name("t1", "abc");
        let info = layer_info("t1", "abc");
        let fields = layer_fields("t1", "abc");
        let prefix = layer_prefix("t1");

        assert!(name.starts_with(&prefix));
        assert!(info.starts_with(&prefix));
        assert!(fields.starts_with(&prefix));
        assert!(!layer_name("t2", "abc").starts_with(&prefix));
    }
}
