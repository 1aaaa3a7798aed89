//! Shared helpers for exercising the batch runner in tests.

use std::path::{Path, PathBuf};
use std::sync::Once;

use anyhow::Result;

use crate::evaluator::EvaluatorCommand;
use crate::DEFAULT_PATH_FLAG;

static INIT: Once = Once::new();

/// Initialize test logging in a thread-safe way.
/// Logging is initialized only once across all tests, even when
/// multiple test files are running in parallel.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .with_test_writer()
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");
    });
}

/// Evaluator built from an inline shell snippet.
///
/// The runner appends `--eval_path <bin>` to the argument list, so the
/// snippet sees the flag as `$1` and the bin path as `$2`.
pub fn shell_evaluator(script: &str) -> EvaluatorCommand {
    EvaluatorCommand {
        program: PathBuf::from("/bin/sh"),
        args: vec![
            "-c".to_string(),
            script.to_string(),
            "fake-evaluator".to_string(),
        ],
        path_flag: DEFAULT_PATH_FLAG.to_string(),
    }
}

/// Evaluator that appends each bin path it receives to `log_path`.
pub fn recording_evaluator(log_path: &Path) -> EvaluatorCommand {
    shell_evaluator(&format!(
        r#"printf '%s\n' "$2" >> "{}""#,
        log_path.display()
    ))
}

/// Evaluator that records the bin path, then exits with `code`.
pub fn recording_evaluator_with_exit(
    log_path: &Path,
    code: i32,
) -> EvaluatorCommand {
    shell_evaluator(&format!(
        r#"printf '%s\n' "$2" >> "{}"; exit {}"#,
        log_path.display(),
        code
    ))
}

/// Evaluator that records the bin path, then sleeps.
pub fn recording_evaluator_with_sleep(
    log_path: &Path,
    seconds: u64,
) -> EvaluatorCommand {
    shell_evaluator(&format!(
        r#"printf '%s\n' "$2" >> "{}"; sleep {}"#,
        log_path.display(),
        seconds
    ))
}

/// Evaluator whose program does not exist, so every launch fails.
pub fn missing_evaluator() -> EvaluatorCommand {
    EvaluatorCommand::new("/nonexistent/knn_classifier.py")
}

/// Bin paths recorded by a recording evaluator, in invocation order.
pub fn recorded_bins(log_path: &Path) -> Vec<String> {
    std::fs::read_to_string(log_path)
        .unwrap_or_default()
        .lines()
        .map(|line| line.to_string())
        .collect()
}

/// Create a temporary bins directory holding one tiny JSON shard per
/// name.
pub fn scratch_bins_dir(names: &[&str]) -> Result<tempfile::TempDir> {
    let dir = tempfile::tempdir()?;
    for name in names {
        std::fs::write(dir.path().join(name), "{}")?;
    }
    Ok(dir)
}
