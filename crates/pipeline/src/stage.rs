//! Timeout-bounded execution of a single pipeline stage.
//!
//! Every stage runs on its own Tokio task, gated by a shared semaphore that
//! plays the role of the stage worker pool. The waiting side enforces a
//! wall-clock limit; when it expires the stage task is aborted, which drops
//! the collaborator future (and any child process it owns), so a late result
//! can never be observed.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::collaborators::CollaboratorError;

/// Default number of stages allowed to run at the same time.
pub const DEFAULT_STAGE_WORKERS: usize = 3;

/// A step of the pipeline, for attribution in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    ScriptSynthesis,
    Rendering,
    Finalization,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::ScriptSynthesis => "script_synthesis",
            Stage::Rendering => "rendering",
            Stage::Finalization => "finalization",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a stage did not produce its output.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    #[error("{stage} timed out after {elapsed_ms}ms")]
    Timeout { stage: Stage, elapsed_ms: u64 },

    #[error("{stage} failed: {message}")]
    Failed { stage: Stage, message: String },

    #[error("{stage} produced no artifact: {detail}")]
    ArtifactMissing { stage: Stage, detail: String },
}

impl StageError {
    pub fn stage(&self) -> Stage {
        match self {
            StageError::Timeout { stage, .. }
            | StageError::Failed { stage, .. }
            | StageError::ArtifactMissing { stage, .. } => *stage,
        }
    }

    fn from_collaborator(stage: Stage, error: CollaboratorError) -> Self {
        match error {
            CollaboratorError::Timeout { elapsed_ms } => StageError::Timeout { stage, elapsed_ms },
            CollaboratorError::ArtifactMissing(detail) => StageError::ArtifactMissing { stage, detail },
            other => StageError::Failed {
                stage,
                message: other.to_string(),
            },
        }
    }
}

/// Result of a stage that may substitute a fallback for its real output.
#[derive(Debug)]
pub enum StageOutcome<T> {
    Completed(T),
    Degraded { output: T, cause: StageError },
}

impl<T> StageOutcome<T> {
    pub fn is_degraded(&self) -> bool {
        matches!(self, StageOutcome::Degraded { .. })
    }

    pub fn into_output(self) -> T {
        match self {
            StageOutcome::Completed(output) | StageOutcome::Degraded { output, .. } => output,
        }
    }
}

/// Aborts the wrapped task when dropped, so a driver that stops waiting
/// (timeout, or its own task being aborted) never leaves stage work behind.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Runs stages with a timeout on a bounded pool of tasks.
#[derive(Clone)]
pub struct StageExecutor {
    workers: Arc<Semaphore>,
}

impl StageExecutor {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Permits currently free in the stage worker pool.
    pub fn available_workers(&self) -> usize {
        self.workers.available_permits()
    }

    /// Run `op` as `stage`, giving up after `limit`.
    ///
    /// Time spent waiting for a free worker counts against the limit.
    pub async fn run<T, F>(&self, stage: Stage, limit: Duration, op: F) -> Result<T, StageError>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, CollaboratorError>> + Send + 'static,
    {
        let workers = Arc::clone(&self.workers);
        let start = Instant::now();
        let mut task = AbortOnDrop(tokio::spawn(async move {
            let _permit = workers
                .acquire_owned()
                .await
                .map_err(|_| CollaboratorError::Failed("stage worker pool is closed".into()))?;
            op.await
        }));

        match tokio::time::timeout(limit, &mut task.0).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(e))) => Err(StageError::from_collaborator(stage, e)),
            Ok(Err(join_err)) => {
                let message = if join_err.is_panic() {
                    format!("stage panicked: {}", panic_message(join_err.into_panic()))
                } else {
                    "stage task was cancelled".to_string()
                };
                Err(StageError::Failed { stage, message })
            }
            Err(_elapsed) => {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                tracing::warn!(%stage, elapsed_ms, "Stage timed out");
                Err(StageError::Timeout { stage, elapsed_ms })
            }
        }
    }

    /// Like [`run`](Self::run), but on failure asks `fallback` for a
    /// substitute output. Without one the stage error is returned.
    pub async fn run_with_fallback<T, F, B>(
        &self,
        stage: Stage,
        limit: Duration,
        op: F,
        fallback: B,
    ) -> Result<StageOutcome<T>, StageError>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, CollaboratorError>> + Send + 'static,
        B: FnOnce(&StageError) -> Option<T>,
    {
        match self.run(stage, limit, op).await {
            Ok(output) => Ok(StageOutcome::Completed(output)),
            Err(cause) => match fallback(&cause) {
                Some(output) => {
                    tracing::warn!(%stage, error = %cause, "Stage degraded to fallback output");
                    Ok(StageOutcome::Degraded { output, cause })
                }
                None => Err(cause),
            },
        }
    }
}

impl Default for StageExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_STAGE_WORKERS)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
