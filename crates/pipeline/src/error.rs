use vidgen_core::error::CoreError;
use vidgen_core::job::JobStatus;
use vidgen_core::types::JobId;

/// Errors surfaced by the job orchestration layer.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Too many concurrent videos: {active} active, limit is {ceiling}")]
    AdmissionRejected { active: usize, ceiling: usize },

    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Duplicate job id: {0}")]
    DuplicateId(JobId),

    #[error("Job {id} is not ready: status is {status}")]
    NotReady { id: JobId, status: JobStatus },

    #[error("Job {id} is still {status} and cannot be deleted")]
    JobActive { id: JobId, status: JobStatus },

    #[error("Service is shutting down")]
    ShuttingDown,

    #[error("Artifact store error: {0}")]
    ArtifactStore(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}
