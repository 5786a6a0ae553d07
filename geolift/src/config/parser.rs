//! INI parsing for the configuration file.
//!
//! Starts from defaults and overlays whatever sections and keys the
//! file provides, so a partial config file is always valid.

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use ini::Ini;
use std::path::PathBuf;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Parses an INI document into a [`ConfigFile`], overlaying defaults.
pub fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    if let Some(section) = ini.section(Some("worker")) {
        if let Some(value) = section.get("workspace") {
            config.worker.workspace = PathBuf::from(value);
        }
        if let Some(value) = section.get("lease_seconds") {
            config.worker.lease_seconds = parse_positive(value, "worker", "lease_seconds")?;
        }
        if let Some(value) = section.get("retry_ceiling") {
            config.worker.retry_ceiling =
                parse_positive(value, "worker", "retry_ceiling")? as u32;
        }
    }

    if let Some(section) = ini.section(Some("store")) {
        if let Some(value) = section.get("url") {
            config.store.url = value.to_string();
        }
    }

    if let Some(section) = ini.section(Some("logging")) {
        if let Some(value) = section.get("level") {
            let level = value.to_lowercase();
            if !LOG_LEVELS.contains(&level.as_str()) {
                return Err(ConfigFileError::InvalidValue {
                    section: "logging".to_string(),
                    key: "level".to_string(),
                    value: value.to_string(),
                    reason: "must be one of: trace, debug, info, warn, error".to_string(),
                });
            }
            config.logging.level = level;
        }
        if let Some(value) = section.get("directory") {
            if !value.is_empty() {
                config.logging.directory = Some(PathBuf::from(value));
            }
        }
    }

    Ok(config)
}

fn parse_positive(value: &str, section: &str, key: &str) -> Result<u64, ConfigFileError> {
    match value.parse::<u64>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: "must be a positive integer".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_LEASE_SECONDS, DEFAULT_STORE_URL};

    fn load(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let ini = Ini::load_from_str(content).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = load("").unwrap();
        assert_eq!(config.worker.lease_seconds, DEFAULT_LEASE_SECONDS);
        assert_eq!(config.store.url, DEFAULT_STORE_URL);
    }

    #[test]
    fn test_partial_file_overlays_defaults() {
        let config = load("[store]\nurl = redis://other:6380\n").unwrap();
        assert_eq!(config.store.url, "redis://other:6380");
        assert_eq!(config.worker.lease_seconds, DEFAULT_LEASE_SECONDS);
    }

    #[test]
    fn test_worker_section() {
        let config = load(
            "[worker]\nworkspace = /var/lib/geolift\nlease_seconds = 30\nretry_ceiling = 3\n",
        )
        .unwrap();
        assert_eq!(config.worker.workspace, PathBuf::from("/var/lib/geolift"));
        assert_eq!(config.worker.lease_seconds, 30);
        assert_eq!(config.worker.retry_ceiling, 3);
    }

    #[test]
    fn test_zero_lease_rejected() {
        let result = load("[worker]\nlease_seconds = 0\n");
        assert!(matches!(
            result,
            Err(ConfigFileError::InvalidValue { ref key, .. }) if key == "lease_seconds"
        ));
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let result = load("[logging]\nlevel = verbose\n");
        assert!(matches!(
            result,
            Err(ConfigFileError::InvalidValue { ref section, .. }) if section == "logging"
        ));
    }

    #[test]
    fn test_log_level_case_insensitive() {
        let config = load("[logging]\nlevel = DEBUG\n").unwrap();
        assert_eq!(config.logging.level, "debug");
    }
}
