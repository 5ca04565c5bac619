//! Narrow interfaces to the external work a pipeline performs.
//!
//! The pipeline only sees these traits; concrete implementations live in
//! `vidgen-synth` (script synthesis) and `vidgen-render` (rendering and
//! artifact storage). All of them are shared as `Arc<dyn _>`.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use vidgen_core::job::{ArtifactRef, VideoRequest};
use vidgen_core::types::JobId;

/// Errors returned by collaborator implementations.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{0}")]
    Failed(String),

    #[error("Artifact missing: {0}")]
    ArtifactMissing(String),

    #[error("Timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A rendered file that has not yet been moved into the artifact store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    /// The rendered video file.
    pub path: PathBuf,
    /// Scratch directory the renderer worked in; removed once the file is
    /// persisted.
    pub scratch_dir: Option<PathBuf>,
}

impl ArtifactHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            scratch_dir: None,
        }
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }
}

/// Turns a video request into renderable script text.
#[async_trait]
pub trait ContentSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &VideoRequest) -> Result<String, CollaboratorError>;

    /// Substitute script used when the synthesis stage is allowed to
    /// degrade.
    fn degraded(&self, _request: &VideoRequest) -> Option<String> {
        None
    }
}

/// Turns script text into a video file.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, script: &str, job_id: JobId) -> Result<ArtifactHandle, CollaboratorError>;

    /// Substitute video used when the rendering stage is allowed to degrade.
    fn degraded(&self, _job_id: JobId) -> Option<ArtifactHandle> {
        None
    }
}

/// Durable home of finished videos.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Move a rendered file into the store and return its reference.
    async fn persist(&self, job_id: JobId, handle: ArtifactHandle) -> Result<ArtifactRef, CollaboratorError>;

    /// Release an artifact. Removing one that is already gone succeeds.
    async fn remove(&self, artifact: &ArtifactRef) -> Result<(), CollaboratorError>;

    /// Local filesystem location of an artifact, for streaming downloads.
    fn path_of(&self, artifact: &ArtifactRef) -> PathBuf {
        PathBuf::from(artifact.as_str())
    }
}

/// The set of collaborators every pipeline run uses.
#[derive(Clone)]
pub struct Collaborators {
    pub synthesizer: Arc<dyn ContentSynthesizer>,
    pub renderer: Arc<dyn Renderer>,
    pub store: Arc<dyn ArtifactStore>,
}
