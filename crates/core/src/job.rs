//! Video generation job model and its state machine.
//!
//! A [`JobRecord`] is only ever mutated through a [`JobPatch`], which is
//! checked against the record invariants before any field changes. The
//! registry in `vidgen-pipeline` relies on [`JobRecord::apply`] being
//! all-or-nothing.

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::types::{JobId, Timestamp};

/// Shortest accepted prompt, in characters.
pub const MIN_PROMPT_CHARS: u64 = 10;

/// Longest accepted prompt, in characters.
pub const MAX_PROMPT_CHARS: u64 = 10_000;

/// Duration limit applied when the request does not carry one.
pub const DEFAULT_DURATION_LIMIT_SECS: u32 = 30;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Pipeline state of a job.
///
/// Declaration order is the order of the success path, which is also the
/// order used for per-status statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    GeneratingScript,
    RenderingVideo,
    Completed,
    Failed,
}

impl JobStatus {
    /// Every status, in declaration order.
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Queued,
        JobStatus::GeneratingScript,
        JobStatus::RenderingVideo,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    /// Statuses that count against the admission ceiling.
    pub const ACTIVE: [JobStatus; 3] = [
        JobStatus::Queued,
        JobStatus::GeneratingScript,
        JobStatus::RenderingVideo,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Wire name, matching the serde representation.
    pub fn name(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::GeneratingScript => "generating_script",
            JobStatus::RenderingVideo => "rendering_video",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether `next` is reachable from `self` in one step.
    ///
    /// Staying in the same non-terminal status is allowed so message and
    /// progress can change within a stage. The success path only moves to
    /// its direct successor; any non-terminal status may fail.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Completed | Failed, _) => false,
            (_, Failed) => true,
            (current, next) if current == next => true,
            (Queued, GeneratingScript)
            | (GeneratingScript, RenderingVideo)
            | (RenderingVideo, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

fn default_duration_limit() -> u32 {
    DEFAULT_DURATION_LIMIT_SECS
}

/// What the caller asked for: a description of an educational video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct VideoRequest {
    /// Free-text description of the video content.
    #[validate(length(min = 10, max = 10000))]
    pub prompt: String,
    /// Maximum video length in seconds.
    #[serde(default = "default_duration_limit")]
    #[validate(range(min = 5, max = 1200))]
    pub duration_limit: u32,
}

impl VideoRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            duration_limit: DEFAULT_DURATION_LIMIT_SECS,
        }
    }

    pub fn with_duration_limit(mut self, secs: u32) -> Self {
        self.duration_limit = secs;
        self
    }

    /// Run the derived field validation and flatten the result into a
    /// [`CoreError::Validation`].
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(e.to_string().replace('\n', "; ")))
    }
}

// ---------------------------------------------------------------------------
// Artifact reference
// ---------------------------------------------------------------------------

/// Opaque handle to a finished video held by an artifact store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Observable state of one video generation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub request: VideoRequest,
    pub status: JobStatus,
    pub message: String,
    pub progress: u8,
    pub created_at: Timestamp,
    /// Finished video, present only once the job completed.
    pub artifact_ref: Option<ArtifactRef>,
    /// Generated script text, available as soon as synthesis finished.
    pub intermediate_ref: Option<String>,
    /// Failure summary, present only once the job failed.
    pub error_detail: Option<String>,
    /// Set when a stage fell back to a substitute result.
    pub degraded: bool,
}

impl JobRecord {
    /// A freshly admitted job, queued with zero progress.
    pub fn new(id: JobId, request: VideoRequest) -> Self {
        Self::with_created_at(id, request, chrono::Utc::now())
    }

    pub fn with_created_at(id: JobId, request: VideoRequest, created_at: Timestamp) -> Self {
        Self {
            id,
            request,
            status: JobStatus::Queued,
            message: "Video generation queued".to_string(),
            progress: 0,
            created_at,
            artifact_ref: None,
            intermediate_ref: None,
            error_detail: None,
            degraded: false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply `patch` atomically.
    ///
    /// Either every field in the patch is written or, when the result would
    /// violate a record invariant, nothing is and an
    /// [`CoreError::InvalidUpdate`] describes why.
    pub fn apply(&mut self, patch: JobPatch) -> Result<(), CoreError> {
        let invalid = |reason: String| CoreError::InvalidUpdate {
            id: self.id,
            reason,
        };

        if self.status.is_terminal() {
            return Err(invalid(format!("job is already {}", self.status)));
        }

        let mut next = self.clone();

        if let Some(status) = patch.status {
            if !self.status.can_transition_to(status) {
                return Err(invalid(format!(
                    "cannot move from {} to {status}",
                    self.status
                )));
            }
            next.status = status;
        }

        if let Some(progress) = patch.progress {
            if progress > 100 {
                return Err(invalid(format!("progress {progress} exceeds 100")));
            }
            if progress < self.progress {
                return Err(invalid(format!(
                    "progress may not go back from {} to {progress}",
                    self.progress
                )));
            }
            next.progress = progress;
        }

        if let Some(message) = patch.message {
            next.message = message;
        }

        if let Some(script) = patch.intermediate_ref {
            next.intermediate_ref = Some(script);
        }

        if let Some(artifact) = patch.artifact_ref {
            if self.artifact_ref.is_some() {
                return Err(invalid("artifact reference is already set".into()));
            }
            next.artifact_ref = Some(artifact);
        }

        if let Some(detail) = patch.error_detail {
            if self.error_detail.is_some() {
                return Err(invalid("error detail is already set".into()));
            }
            next.error_detail = Some(detail);
        }

        if let Some(degraded) = patch.degraded {
            next.degraded |= degraded;
        }

        match next.status {
            JobStatus::Completed => {
                if next.artifact_ref.is_none() {
                    return Err(invalid("completed job needs an artifact reference".into()));
                }
                next.progress = 100;
            }
            JobStatus::Failed => {
                let has_detail = next
                    .error_detail
                    .as_deref()
                    .is_some_and(|d| !d.trim().is_empty());
                if !has_detail {
                    return Err(invalid("failed job needs a non-empty error detail".into()));
                }
            }
            _ => {
                if next.artifact_ref.is_some() {
                    return Err(invalid("artifact reference is only set on completion".into()));
                }
                if next.error_detail.is_some() {
                    return Err(invalid("error detail is only set on failure".into()));
                }
            }
        }

        *self = next;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Patch
// ---------------------------------------------------------------------------

/// The closed set of job fields a pipeline step may change.
///
/// `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub message: Option<String>,
    pub progress: Option<u8>,
    pub intermediate_ref: Option<String>,
    pub artifact_ref: Option<ArtifactRef>,
    pub error_detail: Option<String>,
    pub degraded: Option<bool>,
}

impl JobPatch {
    /// Move to `status` with a new step message and progress checkpoint.
    pub fn transition(status: JobStatus, message: impl Into<String>, progress: u8) -> Self {
        Self {
            status: Some(status),
            message: Some(message.into()),
            progress: Some(progress),
            ..Default::default()
        }
    }

    /// Terminal success carrying the finished artifact.
    pub fn completed(artifact: ArtifactRef, message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            message: Some(message.into()),
            progress: Some(100),
            artifact_ref: Some(artifact),
            ..Default::default()
        }
    }

    /// Terminal failure. Progress is left where it was.
    pub fn failed(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            message: Some(message.into()),
            error_detail: Some(detail.into()),
            ..Default::default()
        }
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_intermediate(mut self, script: impl Into<String>) -> Self {
        self.intermediate_ref = Some(script.into());
        self
    }

    pub fn with_degraded(mut self, degraded: bool) -> Self {
        self.degraded = Some(degraded);
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn queued() -> JobRecord {
        JobRecord::new(uuid::Uuid::new_v4(), VideoRequest::new("Explain the Pythagorean theorem"))
    }

    fn rendering() -> JobRecord {
        let mut job = queued();
        job.apply(JobPatch::transition(JobStatus::GeneratingScript, "script", 25))
            .unwrap();
        job.apply(JobPatch::transition(JobStatus::RenderingVideo, "render", 50))
            .unwrap();
        job
    }

    // -- status ---------------------------------------------------------------

    #[test]
    fn terminal_statuses() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        for status in JobStatus::ACTIVE {
            assert!(status.is_active());
        }
    }

    #[test]
    fn success_path_moves_one_step_at_a_time() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::GeneratingScript));
        assert!(JobStatus::GeneratingScript.can_transition_to(JobStatus::RenderingVideo));
        assert!(JobStatus::RenderingVideo.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::RenderingVideo));
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::RenderingVideo.can_transition_to(JobStatus::GeneratingScript));
    }

    #[test]
    fn terminal_statuses_have_no_exits() {
        for next in JobStatus::ALL {
            assert!(!JobStatus::Completed.can_transition_to(next));
            assert!(!JobStatus::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn status_serializes_as_snake_case() {
        let json = serde_json::to_string(&JobStatus::GeneratingScript).unwrap();
        assert_eq!(json, "\"generating_script\"");
        assert_eq!(JobStatus::RenderingVideo.to_string(), "rendering_video");
    }

    // -- request --------------------------------------------------------------

    #[test]
    fn request_defaults_duration_limit() {
        let req: VideoRequest =
            serde_json::from_str(r#"{"prompt": "Explain photosynthesis"}"#).unwrap();
        assert_eq!(req.duration_limit, DEFAULT_DURATION_LIMIT_SECS);
        assert!(req.check().is_ok());
    }

    #[test]
    fn short_prompt_rejected() {
        let req = VideoRequest::new("too short");
        assert_matches!(req.check(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn duration_out_of_range_rejected() {
        let req = VideoRequest::new("Explain the water cycle").with_duration_limit(2);
        assert_matches!(req.check(), Err(CoreError::Validation(_)));
        let req = VideoRequest::new("Explain the water cycle").with_duration_limit(1201);
        assert_matches!(req.check(), Err(CoreError::Validation(_)));
    }

    // -- apply ----------------------------------------------------------------

    #[test]
    fn new_record_is_queued_with_zero_progress() {
        let job = queued();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0);
        assert!(job.artifact_ref.is_none());
        assert!(job.error_detail.is_none());
    }

    #[test]
    fn completing_sets_progress_to_100() {
        let mut job = rendering();
        job.apply(JobPatch {
            status: Some(JobStatus::Completed),
            artifact_ref: Some(ArtifactRef::new("videos/a.mp4")),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn completing_without_artifact_rejected() {
        let mut job = rendering();
        let before = job.clone();
        let result = job.apply(JobPatch::transition(JobStatus::Completed, "done", 100));
        assert_matches!(result, Err(CoreError::InvalidUpdate { .. }));
        assert_eq!(job, before);
    }

    #[test]
    fn failing_without_detail_rejected() {
        let mut job = queued();
        let result = job.apply(JobPatch::failed("failed", "  "));
        assert_matches!(result, Err(CoreError::InvalidUpdate { .. }));
        assert_eq!(job.status, JobStatus::Queued);
    }

    #[test]
    fn failure_keeps_last_progress() {
        let mut job = queued();
        job.apply(JobPatch::transition(JobStatus::GeneratingScript, "script", 25))
            .unwrap();
        job.apply(JobPatch::failed("Video generation failed", "model unavailable"))
            .unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.progress, 25);
        assert_eq!(job.error_detail.as_deref(), Some("model unavailable"));
    }

    #[test]
    fn progress_cannot_regress() {
        let mut job = rendering();
        let result = job.apply(JobPatch::default().with_progress(40));
        assert_matches!(result, Err(CoreError::InvalidUpdate { .. }));
        assert_eq!(job.progress, 50);
    }

    #[test]
    fn progress_above_100_rejected() {
        let mut job = queued();
        assert!(job.apply(JobPatch::default().with_progress(101)).is_err());
    }

    #[test]
    fn terminal_record_is_frozen() {
        let mut job = queued();
        job.apply(JobPatch::failed("failed", "boom")).unwrap();
        let result = job.apply(JobPatch {
            message: Some("late write".into()),
            ..Default::default()
        });
        assert_matches!(result, Err(CoreError::InvalidUpdate { .. }));
        assert_eq!(job.message, "failed");
    }

    #[test]
    fn artifact_only_with_completion() {
        let mut job = rendering();
        let result = job.apply(JobPatch {
            artifact_ref: Some(ArtifactRef::new("videos/a.mp4")),
            ..Default::default()
        });
        assert_matches!(result, Err(CoreError::InvalidUpdate { .. }));
        assert!(job.artifact_ref.is_none());
    }

    #[test]
    fn skipping_a_stage_rejected() {
        let mut job = queued();
        let result = job.apply(JobPatch::transition(JobStatus::RenderingVideo, "render", 50));
        assert_matches!(result, Err(CoreError::InvalidUpdate { .. }));
    }

    #[test]
    fn degraded_flag_is_sticky() {
        let mut job = queued();
        job.apply(JobPatch::default().with_degraded(true)).unwrap();
        job.apply(JobPatch::default().with_degraded(false)).unwrap();
        assert!(job.degraded);
    }
}
