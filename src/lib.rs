use std::path::PathBuf;
use std::time::Duration;

pub mod app;
pub mod corpus;
pub mod dev_bins;
pub mod evaluator;
pub mod runner;

pub mod test_utils;

use crate::evaluator::EvaluatorCommand;

/// Results artifact the evaluator rewrites; removed before every batch.
pub const DEFAULT_RESULTS_PATH: &str = "results/dev_bin_results.json";
/// Directory of dev bin shards, one JSON file per bin.
pub const DEFAULT_BINS_DIR: &str = "data/pan/dev_bins/sorted_by_docfreq";
/// Evaluator program invoked once per bin.
pub const DEFAULT_EVALUATOR: &str = "./knn_classifier.py";
/// Flag that hands the bin path to the evaluator.
pub const DEFAULT_PATH_FLAG: &str = "--eval_path";

// Config struct to hold the batch run configuration
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub results_path: PathBuf,
    pub bins_dir: PathBuf,
    pub evaluator: EvaluatorCommand,
    /// Abort the batch on the first non-zero exit or timeout.
    pub stop_on_failure: bool,
    /// Wall-clock limit per invocation; unlimited when `None`.
    pub invocation_timeout: Option<Duration>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            results_path: PathBuf::from(DEFAULT_RESULTS_PATH),
            bins_dir: PathBuf::from(DEFAULT_BINS_DIR),
            evaluator: EvaluatorCommand::default(),
            stop_on_failure: false,
            invocation_timeout: None,
        }
    }
}
