//! Caller-facing façade over admission, dispatch, queries and cleanup.
//!
//! Each admitted job gets its own [`PipelineDriver`] spawned on a
//! [`TaskTracker`]. The orchestrator keeps an abort handle per running
//! driver so [`JobOrchestrator::shutdown`] can either wait for in-flight
//! jobs or abandon them deliberately.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tokio_util::task::TaskTracker;
use vidgen_core::job::{ArtifactRef, JobPatch, JobRecord, JobStatus, VideoRequest};
use vidgen_core::job_events::{MSG_TYPE_JOB_DELETED, MSG_TYPE_JOB_FAILED, MSG_TYPE_JOB_SUBMITTED};
use vidgen_core::types::JobId;

use crate::admission::AdmissionController;
use crate::collaborators::Collaborators;
use crate::config::PipelineConfig;
use crate::driver::{PipelineDriver, StagePlan, MSG_FAILED};
use crate::error::PipelineError;
use crate::events::{JobEvent, JobEventBus};
use crate::registry::{JobRegistry, RegistryStats};
use crate::retention::{RetentionSweeper, SweepReport};
use crate::stage::StageExecutor;

/// Error detail written to jobs abandoned at shutdown.
pub const ABANDONED_DETAIL: &str = "service shut down before the job finished";

/// What happened to in-flight jobs during [`JobOrchestrator::shutdown`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Jobs still running when shutdown began.
    pub in_flight: usize,
    /// Jobs aborted after the grace period and marked failed.
    pub abandoned: Vec<JobId>,
}

pub struct JobOrchestrator {
    registry: Arc<JobRegistry>,
    admission: AdmissionController,
    executor: StageExecutor,
    collaborators: Collaborators,
    plan: StagePlan,
    events: Arc<JobEventBus>,
    sweeper: RetentionSweeper,
    tracker: TaskTracker,
    running: Arc<Mutex<HashMap<JobId, AbortHandle>>>,
    accepting: AtomicBool,
}

impl JobOrchestrator {
    pub fn new(config: &PipelineConfig, collaborators: Collaborators) -> Self {
        let registry = Arc::new(JobRegistry::new());
        let events = Arc::new(JobEventBus::default());
        let sweeper = RetentionSweeper::new(
            Arc::clone(&registry),
            Arc::clone(&collaborators.store),
            Arc::clone(&events),
        );
        Self {
            admission: AdmissionController::new(Arc::clone(&registry), config.max_concurrent_jobs),
            executor: StageExecutor::new(config.stage_workers),
            plan: config.plan,
            registry,
            collaborators,
            events,
            sweeper,
            tracker: TaskTracker::new(),
            running: Arc::new(Mutex::new(HashMap::new())),
            accepting: AtomicBool::new(true),
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn sweeper(&self) -> &RetentionSweeper {
        &self.sweeper
    }

    pub fn admission_ceiling(&self) -> usize {
        self.admission.ceiling()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Validate and admit `request`, then start its pipeline.
    pub async fn submit(&self, request: VideoRequest) -> Result<JobRecord, PipelineError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(PipelineError::ShuttingDown);
        }
        request.check()?;

        let record = self
            .admission
            .admit(JobRecord::new(uuid::Uuid::new_v4(), request))
            .await?;
        tracing::info!(
            job_id = %record.id,
            duration_limit = record.request.duration_limit,
            "Video job admitted",
        );
        self.events
            .publish(JobEvent::from_record(MSG_TYPE_JOB_SUBMITTED, &record));
        if !self.dispatch(record.id) {
            // Shutdown began while this job waited for admission.
            self.abandon(record.id).await;
            return Err(PipelineError::ShuttingDown);
        }
        Ok(record)
    }

    /// Spawn the pipeline for `job_id`. Returns `false` once shutdown has
    /// begun, in which case nothing is spawned.
    fn dispatch(&self, job_id: JobId) -> bool {
        let driver = PipelineDriver::new(
            job_id,
            Arc::clone(&self.registry),
            self.executor.clone(),
            self.collaborators.clone(),
            self.plan,
            Arc::clone(&self.events),
        )
        .with_tracker(self.tracker.clone());
        let running = Arc::clone(&self.running);

        // Hold the lock across the spawn so the task cannot deregister
        // before it is registered.
        let mut guard = lock(&self.running);
        if !self.accepting.load(Ordering::SeqCst) {
            return false;
        }
        let handle = self.tracker.spawn(async move {
            let outcome = driver.run().await;
            tracing::debug!(%job_id, ?outcome, "Pipeline task finished");
            lock(&running).remove(&job_id);
        });
        guard.insert(job_id, handle.abort_handle());
        true
    }

    /// Force `job_id` to FAILED after its pipeline was stopped or never
    /// started. Returns `false` if the job had already settled.
    async fn abandon(&self, job_id: JobId) -> bool {
        match self
            .registry
            .update(job_id, JobPatch::failed(MSG_FAILED, ABANDONED_DETAIL))
            .await
        {
            Ok(record) => {
                tracing::warn!(%job_id, "Pipeline abandoned at shutdown");
                self.events
                    .publish(JobEvent::from_record(MSG_TYPE_JOB_FAILED, &record));
                true
            }
            Err(e) => {
                tracing::debug!(%job_id, error = %e, "Abandoned job already settled");
                false
            }
        }
    }

    pub async fn get_status(&self, id: JobId) -> Result<JobRecord, PipelineError> {
        self.registry.get(id).await
    }

    /// The finished video, once the job has completed.
    pub async fn get_artifact(&self, id: JobId) -> Result<ArtifactRef, PipelineError> {
        let record = self.registry.get(id).await?;
        match (record.status, record.artifact_ref) {
            (JobStatus::Completed, Some(artifact)) => Ok(artifact),
            (status, _) => Err(PipelineError::NotReady { id, status }),
        }
    }

    /// Local path of an artifact, for streaming it to a caller.
    pub fn artifact_path(&self, artifact: &ArtifactRef) -> PathBuf {
        self.collaborators.store.path_of(artifact)
    }

    /// The generated script, available once synthesis has finished.
    pub async fn get_script(&self, id: JobId) -> Result<String, PipelineError> {
        let record = self.registry.get(id).await?;
        record
            .intermediate_ref
            .ok_or(PipelineError::NotReady {
                id,
                status: record.status,
            })
    }

    /// Delete a finished job and its artifact.
    ///
    /// Returns `false` when no such job exists. Jobs still running are
    /// refused with [`PipelineError::JobActive`]. The record is only removed
    /// once its artifact has been released.
    pub async fn delete_job(&self, id: JobId) -> Result<bool, PipelineError> {
        let record = match self.registry.get(id).await {
            Ok(record) => record,
            Err(PipelineError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        if !record.is_terminal() {
            return Err(PipelineError::JobActive {
                id,
                status: record.status,
            });
        }
        if let Some(artifact) = &record.artifact_ref {
            self.collaborators
                .store
                .remove(artifact)
                .await
                .map_err(|e| PipelineError::ArtifactStore(e.to_string()))?;
        }
        match self.registry.delete(id).await {
            Some(removed) => {
                tracing::info!(job_id = %id, "Video job deleted");
                self.events
                    .publish(JobEvent::from_record(MSG_TYPE_JOB_DELETED, &removed));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn list_jobs(&self, filter: Option<JobStatus>) -> Vec<JobRecord> {
        self.registry.list(filter).await
    }

    pub async fn stats(&self) -> RegistryStats {
        self.registry.stats().await
    }

    /// Run a retention sweep now.
    pub async fn trigger_cleanup(&self, window: Duration) -> SweepReport {
        self.sweeper.sweep(window).await
    }

    /// Jobs whose pipeline task is still running.
    pub fn in_flight(&self) -> Vec<JobId> {
        lock(&self.running).keys().copied().collect()
    }

    /// Stop accepting work and wind down running pipelines.
    ///
    /// Waits up to `grace` for in-flight jobs to finish; whatever is still
    /// running afterwards is aborted and marked failed.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownReport {
        self.accepting.store(false, Ordering::SeqCst);
        self.tracker.close();

        // Any dispatch that saw `accepting` set is registered before this
        // lock is granted.
        let in_flight = lock(&self.running).len();
        tracing::info!(in_flight, grace_secs = grace.as_secs(), "Pipeline shutdown started");
        let mut report = ShutdownReport {
            in_flight,
            ..Default::default()
        };

        if tokio::time::timeout(grace, self.tracker.wait()).await.is_ok() {
            tracing::info!("All pipelines finished");
            return report;
        }

        let stragglers: Vec<(JobId, AbortHandle)> = lock(&self.running).drain().collect();
        for (job_id, handle) in stragglers {
            handle.abort();
            if self.abandon(job_id).await {
                report.abandoned.push(job_id);
            }
        }
        self.tracker.wait().await;
        report
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
