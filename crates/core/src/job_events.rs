//! Event type constants for job lifecycle notifications.
//!
//! Published on the pipeline event bus by the driver, the orchestrator and
//! the retention sweeper.

/// Job admitted and queued.
pub const MSG_TYPE_JOB_SUBMITTED: &str = "job_submitted";

/// Progress update during job execution (status, message, percentage).
pub const MSG_TYPE_JOB_PROGRESS: &str = "job_progress";

/// Job completed successfully.
pub const MSG_TYPE_JOB_COMPLETED: &str = "job_completed";

/// Job failed with an error.
pub const MSG_TYPE_JOB_FAILED: &str = "job_failed";

/// Job record removed, either by a caller or by retention.
pub const MSG_TYPE_JOB_DELETED: &str = "job_deleted";
