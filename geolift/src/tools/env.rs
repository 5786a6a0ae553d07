//! Environment preflight for the external toolchains.
//!
//! Both toolchains must be discoverable on PATH before any task is
//! accepted, and each toolchain's executables must live together in a
//! single PATH directory (a split installation usually means two
//! incompatible versions shadowing each other). The conversion
//! toolchain additionally carries a minimum version gate.
//!
//! Every failure here is an environment problem, not a task problem;
//! the orchestrator reports it as transient and asks for redelivery.

use super::{gdal, ToolError, ToolRunner};
use semver::Version;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// ETL engine executables that must share one PATH directory.
const ETL_EXECUTABLES: [&str; 2] = [super::etl::JOB_TOOL, super::etl::TRANSFORM_TOOL];

/// Conversion executables that must share one PATH directory.
const GDAL_EXECUTABLES: [&str; 2] = [gdal::CONVERT_TOOL, gdal::INSPECT_TOOL];

/// Oldest conversion toolchain the worker accepts.
pub fn min_gdal_version() -> Version {
    Version::new(2, 2, 0)
}

/// Preflight failures. All of these are retryable.
#[derive(Debug, Clone, Error)]
pub enum EnvError {
    /// No PATH directory contains all of a toolchain's executables.
    #[error("{toolchain} toolchain not found on PATH ({executables})")]
    ToolchainMissing {
        /// Human name of the toolchain.
        toolchain: &'static str,
        /// The executables that were looked for.
        executables: String,
    },

    /// The conversion toolchain is older than the minimum.
    #[error("conversion toolchain version {found} is below the required {required}")]
    VersionBelowMinimum {
        /// Version reported by the tool.
        found: Version,
        /// Minimum the worker accepts.
        required: Version,
    },

    /// The version banner could not be interpreted.
    #[error("unreadable version banner: {0}")]
    VersionUnreadable(String),

    /// The probe process itself could not be launched.
    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Finds the PATH directory containing every named executable, if any.
pub fn toolchain_dir(executables: &[&str]) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    toolchain_dir_in(&path, executables)
}

fn toolchain_dir_in(path: &std::ffi::OsStr, executables: &[&str]) -> Option<PathBuf> {
    for dir in std::env::split_paths(path) {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        let names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        if executables.iter().all(|exe| names.iter().any(|n| n == exe)) {
            return Some(dir);
        }
    }
    None
}

/// Extracts the first dotted version number from a tool banner,
/// e.g. `GDAL 2.2.3, released 2017/11/20` yields `2.2.3`.
pub fn parse_version_banner(banner: &str) -> Result<Version, EnvError> {
    let start = banner
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| EnvError::VersionUnreadable(banner.to_string()))?;
    let candidate: String = banner[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let candidate = candidate.trim_end_matches('.');
    // Tolerate a two-part number by padding the patch component.
    let padded;
    let candidate = if candidate.matches('.').count() == 1 {
        padded = format!("{candidate}.0");
        &padded
    } else {
        candidate
    };
    Version::parse(candidate).map_err(|_| EnvError::VersionUnreadable(banner.to_string()))
}

/// Checks presence and version of the conversion toolchain.
pub async fn check_gdal<R: ToolRunner>(runner: &R) -> Result<(), EnvError> {
    let dir = toolchain_dir(&GDAL_EXECUTABLES).ok_or(EnvError::ToolchainMissing {
        toolchain: "conversion",
        executables: GDAL_EXECUTABLES.join(", "),
    })?;
    debug!(dir = %dir.display(), "conversion toolchain found");

    let output = runner.run(gdal::INSPECT_TOOL, &gdal::version_args()).await?;
    let found = parse_version_banner(&output.stdout)?;
    let required = min_gdal_version();
    if found < required {
        return Err(EnvError::VersionBelowMinimum { found, required });
    }
    Ok(())
}

/// Checks presence of the ETL engine.
pub fn check_etl() -> Result<(), EnvError> {
    let dir = toolchain_dir(&ETL_EXECUTABLES).ok_or(EnvError::ToolchainMissing {
        toolchain: "ETL",
        executables: ETL_EXECUTABLES.join(", "),
    })?;
    debug!(dir = %dir.display(), "ETL toolchain found");
    Ok(())
}

/// Full preflight: both toolchains present, conversion version ok.
pub async fn check_environment<R: ToolRunner>(runner: &R) -> Result<(), EnvError> {
    check_gdal(runner).await?;
    check_etl()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_banner_with_release_date() {
        let v = parse_version_banner("GDAL 2.2.3, released 2017/11/20").unwrap();
        assert_eq!(v, Version::new(2, 2, 3));
    }

    #[test]
    fn test_two_part_version_is_padded() {
        let v = parse_version_banner("GDAL 3.4").unwrap();
        assert_eq!(v, Version::new(3, 4, 0));
    }

    #[test]
    fn test_banner_without_numbers_is_unreadable() {
        assert!(matches!(
            parse_version_banner("no version here"),
            Err(EnvError::VersionUnreadable(_))
        ));
    }

    #[test]
    fn test_old_version_is_below_minimum() {
        let found = parse_version_banner("GDAL 2.1.0, released 2016/04/25").unwrap();
        assert!(found < min_gdal_version());
    }

    #[test]
    fn test_toolchain_dir_finds_colocated_executables() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ogr2ogr"), b"").unwrap();
        std::fs::write(dir.path().join("ogrinfo"), b"").unwrap();

        let path = std::env::join_paths([dir.path()]).unwrap();
        assert_eq!(
            toolchain_dir_in(&path, &["ogr2ogr", "ogrinfo"]),
            Some(dir.path().to_path_buf())
        );
    }

    #[test]
    fn test_toolchain_dir_requires_colocation() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        std::fs::write(a.path().join("ogr2ogr"), b"").unwrap();
        std::fs::write(b.path().join("ogrinfo"), b"").unwrap();

        // Neither directory holds both names, so the pair is not found.
        let path = std::env::join_paths([a.path(), b.path()]).unwrap();
        assert_eq!(toolchain_dir_in(&path, &["ogr2ogr", "ogrinfo"]), None);
    }
}
