use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::{DEFAULT_EVALUATOR, DEFAULT_PATH_FLAG};

/// How to invoke the external evaluator for one bin.
///
/// The invocation is `program [args..] <path_flag> <bin>`: any fixed
/// arguments come first and the bin path is always handed over last.
#[derive(Debug, Clone)]
pub struct EvaluatorCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub path_flag: String,
}

impl Default for EvaluatorCommand {
    fn default() -> Self {
        Self::new(DEFAULT_EVALUATOR)
    }
}

impl EvaluatorCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            path_flag: DEFAULT_PATH_FLAG.to_string(),
        }
    }

    /// Build the process command for one bin. Stdout and stderr are
    /// left inherited so evaluator output streams through unchanged.
    pub fn build(&self, bin: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).arg(&self.path_flag).arg(bin);
        command
    }
}

/// Terminal state of a single evaluator invocation.
#[derive(Debug)]
pub enum EvalOutcome {
    /// The process ran to completion and reported this status.
    Completed(ExitStatus),
    /// The process could not be started.
    LaunchFailed(std::io::Error),
    /// The process outlived the configured limit and was killed.
    TimedOut,
}

/// Run the evaluator once for `bin`, waiting for it to finish.
///
/// Never returns an error: every way the invocation can end is a
/// reportable `EvalOutcome`, and the caller decides what each one
/// means for the rest of the batch.
pub async fn run_once(
    evaluator: &EvaluatorCommand,
    bin: &Path,
    limit: Option<Duration>,
) -> EvalOutcome {
    let mut command = evaluator.build(bin);
    debug!("Running evaluator command: {:?}", command);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => return EvalOutcome::LaunchFailed(e),
    };

    let waited = match limit {
        Some(limit) => {
            let waited = timeout(limit, child.wait()).await;
            match waited {
                Ok(waited) => waited,
                Err(_) => {
                    if let Err(e) = child.start_kill() {
                        debug!("Failed to signal timed-out evaluator: {}", e);
                    }
                    // Reap the killed child so it does not linger.
                    let _ = child.wait().await;
                    return EvalOutcome::TimedOut;
                }
            }
        }
        None => child.wait().await,
    };

    match waited {
        Ok(status) => EvalOutcome::Completed(status),
        // A failed wait() carries no exit status to report.
        Err(e) => EvalOutcome::LaunchFailed(e),
    }
}
