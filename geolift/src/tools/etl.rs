//! Command construction for the ETL engine.
//!
//! Jobs (`.kjb`) run through the job runner script, transformations
//! (`.ktr`) through the transformation runner. Both produce the same
//! line-oriented log framing, parsed by [`crate::parser::etl`].

use super::{ToolError, ToolRunner};
use crate::messages::{canned, MessageBag};
use crate::parser;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Job runner script.
pub const JOB_TOOL: &str = "kitchen.sh";
/// Transformation runner script.
pub const TRANSFORM_TOOL: &str = "pan.sh";

/// Extension of ETL job definitions.
pub const JOB_EXTENSION: &str = "kjb";
/// Extension of ETL transformation definitions.
pub const TRANSFORM_EXTENSION: &str = "ktr";

/// Arguments executing the definition at `path`.
///
/// `-level=Detailed` is required: the performance summary lines the
/// worker reports only appear at that verbosity. `-norep` keeps the
/// engine off any configured repository so the file is authoritative.
pub fn run_args(path: &Path) -> Vec<String> {
    vec![
        format!("-file={}", path.display()),
        "-level=Detailed".to_string(),
        "-norep".to_string(),
    ]
}

/// Picks the runner script for a definition extension.
///
/// Returns `None` for anything that is not a job or transformation;
/// callers turn that into the extension-not-valid operator error.
pub fn runner_for_extension(extension: &str) -> Option<&'static str> {
    match extension.trim_start_matches('.').to_lowercase().as_str() {
        JOB_EXTENSION => Some(JOB_TOOL),
        TRANSFORM_EXTENSION => Some(TRANSFORM_TOOL),
        _ => None,
    }
}

/// Path of the raw engine log written next to the definition file.
pub fn log_path(source: &Path) -> PathBuf {
    source.with_extension("log")
}

/// Executes the ETL definition at `path` and summarizes its output.
///
/// The raw engine stdout is written to a log file next to the
/// definition for later inspection; failure to write it is only a
/// warning because the parsed messages already carry the outcome.
pub async fn run_definition<R: ToolRunner>(
    runner: &R,
    path: &Path,
) -> Result<MessageBag, ToolError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let Some(tool) = runner_for_extension(extension) else {
        return Ok(canned::extension_not_valid());
    };
    if !path.exists() {
        return Ok(canned::file_not_found());
    }

    let output = runner.run(tool, &run_args(path)).await?;
    if let Err(e) = tokio::fs::write(log_path(path), &output.stdout).await {
        warn!(path = %path.display(), error = %e, "could not write engine log");
    }
    Ok(parser::etl::summarize(parser::etl::parse(
        &output.stdout,
        &output.stderr,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_embed_the_file() {
        let args = run_args(&PathBuf::from("/etl/clean.ktr"));
        assert_eq!(
            args,
            vec!["-file=/etl/clean.ktr", "-level=Detailed", "-norep"]
        );
    }

    #[test]
    fn test_runner_selection_by_extension() {
        assert_eq!(runner_for_extension("kjb"), Some(JOB_TOOL));
        assert_eq!(runner_for_extension(".KTR"), Some(TRANSFORM_TOOL));
        assert_eq!(runner_for_extension("xml"), None);
    }

    #[test]
    fn test_log_sits_next_to_the_definition() {
        assert_eq!(
            log_path(&PathBuf::from("/etl/clean.ktr")),
            PathBuf::from("/etl/clean.log")
        );
    }

    struct FixedRunner(&'static str);

    impl ToolRunner for FixedRunner {
        async fn run(
            &self,
            _executable: &str,
            _args: &[String],
        ) -> Result<crate::tools::ToolOutput, ToolError> {
            Ok(crate::tools::ToolOutput {
                stdout: self.0.to_string(),
                stderr: String::new(),
                status: Some(0),
            })
        }
    }

    #[tokio::test]
    async fn test_run_definition_writes_log_and_summarizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clean.ktr");
        tokio::fs::write(&path, "<transformation/>").await.unwrap();

        let stdout = "INFO  23-08 10:15:04,020 - Write.0 - \
                      Finished processing (I=0, O=5, R=5, W=5, U=0, E=0)\n";
        let bag = run_definition(&FixedRunner(stdout), &path).await.unwrap();

        assert_eq!(
            bag.info,
            vec!["Performance by Write.0: I=0, O=5, R=5, W=5, U=0, E=0."]
        );
        let log = tokio::fs::read_to_string(log_path(&path)).await.unwrap();
        assert_eq!(log, stdout);
    }

    #[tokio::test]
    async fn test_run_definition_gates_on_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clean.xml");
        tokio::fs::write(&path, "<x/>").await.unwrap();

        let bag = run_definition(&FixedRunner(""), &path).await.unwrap();
        assert!(bag.has_errors());
    }

    #[tokio::test]
    async fn test_run_definition_gates_on_missing_file() {
        let bag = run_definition(&FixedRunner(""), Path::new("/none/clean.kjb"))
            .await
            .unwrap();
        assert!(bag.has_errors());
    }
}
