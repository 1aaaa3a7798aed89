use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, error, info, instrument, warn};
use walkdir::WalkDir;

use crate::evaluator::{self, EvalOutcome};
use crate::BatchConfig;

/// Failures that abort a batch before any evaluator has run.
#[derive(Debug)]
pub enum PreconditionError {
    MissingBinsDir(PathBuf),
    NotADirectory(PathBuf),
    ListBins {
        dir: PathBuf,
        source: walkdir::Error,
    },
    RemoveResults {
        path: PathBuf,
        source: io::Error,
    },
}

impl fmt::Display for PreconditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreconditionError::MissingBinsDir(dir) => {
                write!(f, "Bins directory {} does not exist", dir.display())
            }
            PreconditionError::NotADirectory(dir) => {
                write!(f, "Bins path {} is not a directory", dir.display())
            }
            PreconditionError::ListBins { dir, source } => {
                write!(
                    f,
                    "Failed to list bins directory {}: {}",
                    dir.display(),
                    source
                )
            }
            PreconditionError::RemoveResults { path, source } => {
                write!(
                    f,
                    "Failed to remove results artifact {}: {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for PreconditionError {}

/// Counters describing what a finished batch did.
#[derive(Debug, Default, Clone)]
pub struct BatchSummary {
    /// Regular files found in the bins directory.
    pub bins_found: usize,
    /// Invocations that started, whether or not they exited cleanly.
    pub launched: usize,
    /// Invocations that never started.
    pub launch_failures: usize,
    /// Invocations that exited with a non-zero status.
    pub nonzero_exits: usize,
    /// Invocations killed for outliving the configured limit.
    pub timeouts: usize,
    pub duration_ms: u64,
}

/// Remove a previous run's results artifact. A missing artifact is
/// fine; any other removal failure is a precondition error.
pub fn reset_results(path: &Path) -> Result<(), PreconditionError> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!("Removed previous results artifact {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No results artifact at {}", path.display());
            Ok(())
        }
        Err(e) => Err(PreconditionError::RemoveResults {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// List the bin shards to evaluate: every regular file directly inside
/// `dir`, sorted by file name. Anything that is not a regular file is
/// skipped.
pub fn discover_bins(dir: &Path) -> Result<Vec<PathBuf>, PreconditionError> {
    if !dir.exists() {
        return Err(PreconditionError::MissingBinsDir(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(PreconditionError::NotADirectory(dir.to_path_buf()));
    }

    let mut bins = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| PreconditionError::ListBins {
            dir: dir.to_path_buf(),
            source: e,
        })?;
        if entry.file_type().is_file() {
            bins.push(entry.into_path());
        }
    }
    Ok(bins)
}

/// Run the evaluator once per bin shard, in file-name order.
///
/// A bin whose evaluator cannot be launched is logged and skipped; the
/// batch always moves on to the next bin. Exit statuses are recorded
/// in the summary but do not steer the batch unless `stop_on_failure`
/// is set, in which case the first non-zero exit or timeout aborts.
#[instrument(skip(config), err)]
pub async fn run_batch(config: &BatchConfig) -> anyhow::Result<BatchSummary> {
    let started = Instant::now();

    // Stale results must be gone before the first invocation.
    reset_results(&config.results_path)?;

    let bins = discover_bins(&config.bins_dir)?;
    info!("Found {} bins in {}", bins.len(), config.bins_dir.display());

    let mut summary = BatchSummary {
        bins_found: bins.len(),
        ..Default::default()
    };

    for (index, bin) in bins.iter().enumerate() {
        info!(
            "Evaluating bin {}/{}: {}",
            index + 1,
            bins.len(),
            bin.display()
        );
        match evaluator::run_once(
            &config.evaluator,
            bin,
            config.invocation_timeout,
        )
        .await
        {
            EvalOutcome::Completed(status) => {
                summary.launched += 1;
                if status.success() {
                    debug!("Evaluator finished for {}", bin.display());
                } else {
                    summary.nonzero_exits += 1;
                    warn!(
                        "Evaluator exited with {} for {}",
                        status,
                        bin.display()
                    );
                    if config.stop_on_failure {
                        return Err(anyhow::anyhow!(
                            "Evaluator exited with {} for {}",
                            status,
                            bin.display()
                        ));
                    }
                }
            }
            EvalOutcome::TimedOut => {
                summary.launched += 1;
                summary.timeouts += 1;
                warn!("Evaluator timed out for {}", bin.display());
                if config.stop_on_failure {
                    return Err(anyhow::anyhow!(
                        "Evaluator timed out for {}",
                        bin.display()
                    ));
                }
            }
            EvalOutcome::LaunchFailed(e) => {
                summary.launch_failures += 1;
                error!(
                    "Failed to launch evaluator for {}: {}",
                    bin.display(),
                    e
                );
            }
        }
    }

    summary.duration_ms = started.elapsed().as_millis() as u64;
    info!(
        "Batch finished: {} bins, {} launched, {} launch failures, {} non-zero exits, {} timeouts",
        summary.bins_found,
        summary.launched,
        summary.launch_failures,
        summary.nonzero_exits,
        summary.timeouts
    );
    Ok(summary)
}

#[cfg(test)]
mod runner_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_reset_results_removes_existing_artifact() {
        let dir = tempdir().unwrap();
        let results = dir.path().join("dev_bin_results.json");
        fs::write(&results, "{}").unwrap();

        reset_results(&results).unwrap();

        assert!(!results.exists());
    }

    #[test]
    fn test_reset_results_is_a_no_op_when_missing() {
        let dir = tempdir().unwrap();
        let results = dir.path().join("dev_bin_results.json");

        assert!(reset_results(&results).is_ok());
    }

    #[test]
    fn test_reset_results_fails_when_artifact_is_a_directory() {
        let dir = tempdir().unwrap();
        let results = dir.path().join("dev_bin_results.json");
        fs::create_dir(&results).unwrap();

        let err = reset_results(&results).unwrap_err();

        assert!(matches!(err, PreconditionError::RemoveResults { .. }));
        assert!(results.exists());
    }

    #[test]
    fn test_discover_bins_requires_the_directory() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("no_such_bins");

        let err = discover_bins(&missing).unwrap_err();

        assert!(matches!(err, PreconditionError::MissingBinsDir(_)));
        assert_eq!(
            err.to_string(),
            format!("Bins directory {} does not exist", missing.display())
        );
    }

    #[test]
    fn test_discover_bins_rejects_a_file_path() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("bins");
        fs::write(&file, "").unwrap();

        let err = discover_bins(&file).unwrap_err();

        assert!(matches!(err, PreconditionError::NotADirectory(_)));
    }

    #[test]
    fn test_discover_bins_sorts_by_file_name_and_skips_directories() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("c.json"), "{}").unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        fs::write(dir.path().join("b.json"), "{}").unwrap();
        fs::create_dir(dir.path().join("tmp")).unwrap();

        let bins = discover_bins(dir.path()).unwrap();

        assert_eq!(
            bins,
            vec![
                dir.path().join("a.json"),
                dir.path().join("b.json"),
                dir.path().join("c.json"),
            ]
        );
    }

    #[tokio::test]
    async fn test_run_batch_with_empty_bins_dir_does_nothing() {
        let dir = tempdir().unwrap();
        let config = BatchConfig {
            results_path: dir.path().join("results.json"),
            bins_dir: dir.path().join("bins"),
            ..Default::default()
        };
        fs::create_dir(&config.bins_dir).unwrap();

        let summary = run_batch(&config).await.unwrap();

        assert_eq!(summary.bins_found, 0);
        assert_eq!(summary.launched, 0);
        assert_eq!(summary.launch_failures, 0);
    }

    #[tokio::test]
    async fn test_run_batch_surfaces_precondition_errors() {
        let dir = tempdir().unwrap();
        let config = BatchConfig {
            results_path: dir.path().join("results.json"),
            bins_dir: dir.path().join("no_such_bins"),
            ..Default::default()
        };

        let err = run_batch(&config).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<PreconditionError>(),
            Some(PreconditionError::MissingBinsDir(_))
        ));
    }
}
