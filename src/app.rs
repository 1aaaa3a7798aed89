use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use fs2::FileExt;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, Registry};
use tracing_tree::HierarchicalLayer;

use crate::evaluator::EvaluatorCommand;
use crate::runner::run_batch;
use crate::{
    BatchConfig, DEFAULT_BINS_DIR, DEFAULT_EVALUATOR, DEFAULT_PATH_FLAG,
    DEFAULT_RESULTS_PATH,
};

const LOCK_FILE_PATH: &str = "/tmp/binrun.lock";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Results artifact removed before the run; the evaluator recreates it
    #[arg(
        long,
        env = "BINRUN_RESULTS_PATH",
        default_value = DEFAULT_RESULTS_PATH
    )]
    results_path: String,

    /// Directory holding the dev bin JSON shards
    #[arg(long, env = "BINRUN_BINS_DIR", default_value = DEFAULT_BINS_DIR)]
    bins_dir: String,

    /// Evaluator program invoked once per bin
    #[arg(long, env = "BINRUN_EVALUATOR", default_value = DEFAULT_EVALUATOR)]
    evaluator: String,

    /// Extra argument passed to the evaluator before the path flag (repeatable)
    #[arg(long = "evaluator-arg", allow_hyphen_values = true)]
    evaluator_args: Vec<String>,

    /// Flag that hands the bin path to the evaluator
    #[arg(long, default_value = DEFAULT_PATH_FLAG, allow_hyphen_values = true)]
    path_flag: String,

    /// Abort the batch on the first non-zero evaluator exit or timeout
    #[arg(long)]
    stop_on_failure: bool,

    /// Per-invocation timeout in seconds; 0 means no limit
    #[arg(long, default_value_t = 0)]
    timeout_secs: u64,

    // Should create lock file to prevent concurrent batches from
    // racing the results artifact
    #[arg(long)]
    create_lock_file: bool,
}

impl Args {
    fn to_config(&self) -> BatchConfig {
        BatchConfig {
            results_path: PathBuf::from(&self.results_path),
            bins_dir: PathBuf::from(&self.bins_dir),
            evaluator: EvaluatorCommand {
                program: PathBuf::from(&self.evaluator),
                args: self.evaluator_args.clone(),
                path_flag: self.path_flag.clone(),
            },
            stop_on_failure: self.stop_on_failure,
            invocation_timeout: match self.timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

fn create_run_lock(path: &str) -> Result<File> {
    let lock_file = File::create(path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|_| anyhow::anyhow!("Another batch is already running"))?;
    Ok(lock_file)
}

pub async fn run() -> Result<()> {
    // Initialize logging with tracing
    let subscriber = Registry::default()
        .with(
            HierarchicalLayer::new(2)
                .with_targets(true)
                .with_bracketed_fields(true),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        );

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    // Parse command line arguments
    let args = Args::parse();

    // Held until the batch finishes.
    let _lock_file = if args.create_lock_file {
        Some(create_run_lock(LOCK_FILE_PATH).map_err(|e| {
            error!("Failed to create lock file: {}", e);
            e
        })?)
    } else {
        None
    };

    info!("Starting batch evaluation");
    let config = args.to_config();
    let summary = run_batch(&config).await?;

    println!(
        "Batch complete: bins={}, launched={}, launch_failures={}, nonzero_exits={}, timeouts={}, took {}ms",
        summary.bins_found,
        summary.launched,
        summary.launch_failures,
        summary.nonzero_exits,
        summary.timeouts,
        summary.duration_ms
    );
    Ok(())
}
