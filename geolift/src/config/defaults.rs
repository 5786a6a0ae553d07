//! Default values and constants for all configuration settings.

use super::settings::*;
use std::path::PathBuf;

/// Default lease length in seconds for the task lock.
pub const DEFAULT_LEASE_SECONDS: u64 = 21;

/// Default redelivery ceiling for environment failures.
pub const DEFAULT_RETRY_CEILING: u32 = 5;

/// Default shared store URL.
pub const DEFAULT_STORE_URL: &str = "redis://127.0.0.1:6379";

/// Default log level filter.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default workspace directory (~/.geolift/workspace).
pub fn default_workspace() -> PathBuf {
    super::config_directory().join("workspace")
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            worker: WorkerSettings {
                workspace: default_workspace(),
                lease_seconds: DEFAULT_LEASE_SECONDS,
                retry_ceiling: DEFAULT_RETRY_CEILING,
            },
            store: StoreSettings {
                url: DEFAULT_STORE_URL.to_string(),
            },
            logging: LoggingSettings {
                level: DEFAULT_LOG_LEVEL.to_string(),
                directory: None,
            },
        }
    }
}
