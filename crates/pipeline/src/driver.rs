//! Per-job pipeline run.
//!
//! A [`PipelineDriver`] advances one admitted job through script synthesis,
//! rendering and finalization. Every status change is committed to the
//! registry (and published on the event bus) before the next stage starts.
//! If the registry refuses a write, because the record was deleted or
//! already forced into a terminal status, the driver stops without touching
//! the record again.
//!
//! Finalization runs on its own tracked task. Aborting the driver detaches
//! it instead of cancelling it, so a persisted file is always either
//! committed to the record or released.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::task::TaskTracker;
use vidgen_core::job::{ArtifactRef, JobPatch, JobRecord, JobStatus};
use vidgen_core::job_events::{MSG_TYPE_JOB_COMPLETED, MSG_TYPE_JOB_FAILED, MSG_TYPE_JOB_PROGRESS};
use vidgen_core::types::JobId;

use crate::collaborators::{ArtifactHandle, Collaborators};
use crate::error::PipelineError;
use crate::events::{JobEvent, JobEventBus};
use crate::registry::JobRegistry;
use crate::stage::{Stage, StageError, StageExecutor};

/// Default wall-clock limit for script synthesis (all model rounds).
pub const DEFAULT_SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(780);

/// Default wall-clock limit for rendering.
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(300);

/// Wall-clock limit for moving a rendered file into the artifact store.
pub const FINALIZATION_TIMEOUT: Duration = Duration::from_secs(120);

pub const MSG_GENERATING_SCRIPT: &str = "Generating script...";
pub const MSG_SCRIPT_READY: &str = "Script generated";
pub const MSG_RENDERING: &str = "Rendering video...";
pub const MSG_COMPLETED: &str = "Video generated successfully";
pub const MSG_FAILED: &str = "Video generation failed";

/// Timeout and degradation policy for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSpec {
    pub timeout: Duration,
    /// Whether the stage may substitute its collaborator's degraded output
    /// instead of failing the job.
    pub fallback: bool,
}

impl StageSpec {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            fallback: false,
        }
    }

    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback = fallback;
        self
    }
}

/// Per-stage policy for a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagePlan {
    pub synthesis: StageSpec,
    pub render: StageSpec,
}

impl Default for StagePlan {
    fn default() -> Self {
        Self {
            synthesis: StageSpec::new(DEFAULT_SYNTHESIS_TIMEOUT),
            render: StageSpec::new(DEFAULT_RENDER_TIMEOUT),
        }
    }
}

/// How a pipeline run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveOutcome {
    Completed(ArtifactRef),
    Failed(StageError),
    /// The registry stopped accepting writes for this job.
    Abandoned,
}

/// The registry refused a write; the run cannot continue.
struct Halt;

#[derive(Clone)]
pub struct PipelineDriver {
    job_id: JobId,
    registry: Arc<JobRegistry>,
    executor: StageExecutor,
    collaborators: Collaborators,
    plan: StagePlan,
    events: Arc<JobEventBus>,
    tracker: TaskTracker,
}

impl PipelineDriver {
    pub fn new(
        job_id: JobId,
        registry: Arc<JobRegistry>,
        executor: StageExecutor,
        collaborators: Collaborators,
        plan: StagePlan,
        events: Arc<JobEventBus>,
    ) -> Self {
        Self {
            job_id,
            registry,
            executor,
            collaborators,
            plan,
            events,
            tracker: TaskTracker::new(),
        }
    }

    /// Track the finalization task on `tracker`, so waiting on it also
    /// covers finalizations detached from an aborted driver.
    pub fn with_tracker(mut self, tracker: TaskTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Run the job to a terminal status.
    pub async fn run(self) -> DriveOutcome {
        tracing::info!(job_id = %self.job_id, "Pipeline started");
        match self.drive().await {
            Ok(outcome) => outcome,
            Err(Halt) => DriveOutcome::Abandoned,
        }
    }

    async fn drive(&self) -> Result<DriveOutcome, Halt> {
        let record = self
            .commit(
                JobPatch::transition(JobStatus::GeneratingScript, MSG_GENERATING_SCRIPT, 25),
                MSG_TYPE_JOB_PROGRESS,
            )
            .await?;

        // Stage 1: script synthesis.
        let synthesizer = Arc::clone(&self.collaborators.synthesizer);
        let request = record.request.clone();
        let op_request = request.clone();
        let settings = self.plan.synthesis;
        let synthesis = self
            .executor
            .run_with_fallback(
                Stage::ScriptSynthesis,
                settings.timeout,
                async move { synthesizer.synthesize(&op_request).await },
                |_| {
                    settings.fallback
                        .then(|| self.collaborators.synthesizer.degraded(&request))
                        .flatten()
                },
            )
            .await;
        let script_outcome = match synthesis {
            Ok(outcome) => outcome,
            Err(e) => return self.fail(e).await,
        };
        let mut degraded = script_outcome.is_degraded();
        let script = script_outcome.into_output();
        tracing::info!(
            job_id = %self.job_id,
            script_len = script.len(),
            degraded,
            "Script ready",
        );

        self.commit(
            JobPatch {
                message: Some(MSG_SCRIPT_READY.to_string()),
                progress: Some(40),
                intermediate_ref: Some(script.clone()),
                degraded: Some(degraded),
                ..Default::default()
            },
            MSG_TYPE_JOB_PROGRESS,
        )
        .await?;
        self.commit(
            JobPatch::transition(JobStatus::RenderingVideo, MSG_RENDERING, 50),
            MSG_TYPE_JOB_PROGRESS,
        )
        .await?;

        // Stage 2: rendering.
        let renderer = Arc::clone(&self.collaborators.renderer);
        let job_id = self.job_id;
        let settings = self.plan.render;
        let rendering = self
            .executor
            .run_with_fallback(
                Stage::Rendering,
                settings.timeout,
                async move { renderer.render(&script, job_id).await },
                |_| {
                    settings.fallback
                        .then(|| self.collaborators.renderer.degraded(job_id))
                        .flatten()
                },
            )
            .await;
        let render_outcome = match rendering {
            Ok(outcome) => outcome,
            Err(e) => return self.fail(e).await,
        };
        degraded |= render_outcome.is_degraded();
        let handle = render_outcome.into_output();

        let finalizer = self.clone();
        match self
            .tracker
            .spawn(async move { finalizer.finalize(handle, degraded).await })
            .await
        {
            Ok(result) => result,
            Err(join_err) => {
                self.fail(StageError::Failed {
                    stage: Stage::Finalization,
                    message: join_err.to_string(),
                })
                .await
            }
        }
    }

    /// Move the rendered file into the artifact store and complete the job.
    async fn finalize(&self, handle: ArtifactHandle, degraded: bool) -> Result<DriveOutcome, Halt> {
        let store = Arc::clone(&self.collaborators.store);
        let job_id = self.job_id;
        let artifact = match self
            .executor
            .run(Stage::Finalization, FINALIZATION_TIMEOUT, async move {
                store.persist(job_id, handle).await
            })
            .await
        {
            Ok(artifact) => artifact,
            Err(e) => return self.fail(e).await,
        };

        let completed = JobPatch::completed(artifact.clone(), MSG_COMPLETED).with_degraded(degraded);
        if let Err(halt) = self.commit(completed, MSG_TYPE_JOB_COMPLETED).await {
            self.release(&artifact).await;
            return Err(halt);
        }
        tracing::info!(job_id = %self.job_id, %artifact, degraded, "Pipeline completed");
        Ok(DriveOutcome::Completed(artifact))
    }

    /// Mark the job failed with `error` as its detail.
    async fn fail(&self, error: StageError) -> Result<DriveOutcome, Halt> {
        tracing::error!(
            job_id = %self.job_id,
            stage = %error.stage(),
            error = %error,
            "Pipeline failed",
        );
        self.commit(
            JobPatch::failed(MSG_FAILED, error.to_string()),
            MSG_TYPE_JOB_FAILED,
        )
        .await?;
        Ok(DriveOutcome::Failed(error))
    }

    /// Write `patch` and announce the new state.
    async fn commit(&self, patch: JobPatch, event_type: &'static str) -> Result<JobRecord, Halt> {
        match self.registry.update(self.job_id, patch).await {
            Ok(record) => {
                tracing::debug!(
                    job_id = %self.job_id,
                    status = %record.status,
                    progress = record.progress,
                    "Job updated",
                );
                self.events.publish(JobEvent::from_record(event_type, &record));
                Ok(record)
            }
            Err(PipelineError::NotFound(_)) => {
                tracing::info!(job_id = %self.job_id, "Job record removed, stopping pipeline");
                Err(Halt)
            }
            Err(e) => {
                tracing::warn!(job_id = %self.job_id, error = %e, "Job update refused, stopping pipeline");
                Err(Halt)
            }
        }
    }

    /// Drop an artifact no record points at any more.
    async fn release(&self, artifact: &ArtifactRef) {
        if let Err(e) = self.collaborators.store.remove(artifact).await {
            tracing::warn!(
                job_id = %self.job_id,
                %artifact,
                error = %e,
                "Failed to release orphaned artifact",
            );
        }
    }
}
