//! In-memory collaborators and helpers shared by the pipeline tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use vidgen_core::job::{ArtifactRef, JobRecord, VideoRequest};
use vidgen_core::types::JobId;
use vidgen_pipeline::collaborators::{
    ArtifactHandle, ArtifactStore, CollaboratorError, Collaborators, ContentSynthesizer, Renderer,
};
use vidgen_pipeline::config::PipelineConfig;
use vidgen_pipeline::driver::{StagePlan, StageSpec};
use vidgen_pipeline::orchestrator::JobOrchestrator;

pub const SCRIPT: &str = "from manim import *\nclass Demo(Scene):\n    def construct(self):\n        pass\n";
pub const CANNED_SCRIPT: &str = "canned script";

// ---------------------------------------------------------------------------
// Synthesizer
// ---------------------------------------------------------------------------

pub struct MockSynthesizer {
    pub delay: Duration,
    pub error: Option<String>,
    pub degraded: Option<String>,
}

impl MockSynthesizer {
    pub fn ok() -> Self {
        Self {
            delay: Duration::ZERO,
            error: None,
            degraded: Some(CANNED_SCRIPT.to_string()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Self::ok()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::ok()
        }
    }
}

#[async_trait]
impl ContentSynthesizer for MockSynthesizer {
    async fn synthesize(&self, _request: &VideoRequest) -> Result<String, CollaboratorError> {
        tokio::time::sleep(self.delay).await;
        match &self.error {
            Some(message) => Err(CollaboratorError::Failed(message.clone())),
            None => Ok(SCRIPT.to_string()),
        }
    }

    fn degraded(&self, _request: &VideoRequest) -> Option<String> {
        self.degraded.clone()
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

pub struct MockRenderer {
    pub delay: Duration,
    pub error: Option<CollaboratorErrorKind>,
}

#[derive(Clone, Copy)]
pub enum CollaboratorErrorKind {
    Failed,
    ArtifactMissing,
}

impl MockRenderer {
    pub fn ok() -> Self {
        Self {
            delay: Duration::ZERO,
            error: None,
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            error: None,
        }
    }

    pub fn failing(kind: CollaboratorErrorKind) -> Self {
        Self {
            delay: Duration::ZERO,
            error: Some(kind),
        }
    }
}

#[async_trait]
impl Renderer for MockRenderer {
    async fn render(&self, _script: &str, job_id: JobId) -> Result<ArtifactHandle, CollaboratorError> {
        tokio::time::sleep(self.delay).await;
        match self.error {
            Some(CollaboratorErrorKind::Failed) => {
                Err(CollaboratorError::Failed("manim exited with status 1".into()))
            }
            Some(CollaboratorErrorKind::ArtifactMissing) => {
                Err(CollaboratorError::ArtifactMissing("no mp4 in media dir".into()))
            }
            None => Ok(ArtifactHandle::new(format!("/scratch/{job_id}/scene.mp4"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Artifact store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    pub stored: Mutex<HashSet<String>>,
    pub removed: Mutex<Vec<String>>,
    pub fail_removals: AtomicBool,
    pub persist_delay_ms: AtomicU64,
}

impl MemoryStore {
    pub fn contains(&self, artifact: &ArtifactRef) -> bool {
        self.stored.lock().unwrap().contains(artifact.as_str())
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }

    pub fn set_fail_removals(&self, fail: bool) {
        self.fail_removals.store(fail, Ordering::SeqCst);
    }

    pub fn set_persist_delay(&self, delay: Duration) {
        self.persist_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn persist(&self, job_id: JobId, _handle: ArtifactHandle) -> Result<ArtifactRef, CollaboratorError> {
        let delay = self.persist_delay_ms.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        let artifact = ArtifactRef::new(format!("videos/{job_id}.mp4"));
        self.stored.lock().unwrap().insert(artifact.as_str().to_string());
        Ok(artifact)
    }

    async fn remove(&self, artifact: &ArtifactRef) -> Result<(), CollaboratorError> {
        if self.fail_removals.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only volume",
            )));
        }
        self.stored.lock().unwrap().remove(artifact.as_str());
        self.removed.lock().unwrap().push(artifact.as_str().to_string());
        Ok(())
    }

    fn path_of(&self, artifact: &ArtifactRef) -> PathBuf {
        PathBuf::from("/memory").join(artifact.as_str())
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub struct Harness {
    pub orchestrator: JobOrchestrator,
    pub store: Arc<MemoryStore>,
}

pub fn plan(synthesis_timeout: Duration, render_timeout: Duration, fallback: bool) -> StagePlan {
    StagePlan {
        synthesis: StageSpec::new(synthesis_timeout).with_fallback(fallback),
        render: StageSpec::new(render_timeout).with_fallback(fallback),
    }
}

pub fn harness_with(
    synthesizer: MockSynthesizer,
    renderer: MockRenderer,
    plan: StagePlan,
    ceiling: usize,
) -> Harness {
    let store = Arc::new(MemoryStore::default());
    let collaborators = Collaborators {
        synthesizer: Arc::new(synthesizer),
        renderer: Arc::new(renderer),
        store: Arc::clone(&store) as Arc<dyn ArtifactStore>,
    };
    let config = PipelineConfig {
        max_concurrent_jobs: ceiling,
        stage_workers: 3,
        plan,
        ..PipelineConfig::default()
    };
    Harness {
        orchestrator: JobOrchestrator::new(&config, collaborators),
        store,
    }
}

pub fn harness(synthesizer: MockSynthesizer, renderer: MockRenderer) -> Harness {
    harness_with(
        synthesizer,
        renderer,
        plan(Duration::from_secs(5), Duration::from_secs(5), false),
        2,
    )
}

pub fn request() -> VideoRequest {
    VideoRequest::new("Explain how a binary heap keeps its ordering")
}

/// Poll until the job reaches a terminal status.
pub async fn wait_terminal(orchestrator: &JobOrchestrator, id: JobId) -> JobRecord {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let record = orchestrator.get_status(id).await.expect("job should exist");
        if record.is_terminal() {
            return record;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {id} did not finish, last status {}",
            record.status
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll until no pipeline task is running.
pub async fn wait_idle(orchestrator: &JobOrchestrator) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !orchestrator.in_flight().is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "pipelines still running");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
