//! Test application builder and HTTP helpers.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;
use vidgen_api::config::ServerConfig;
use vidgen_api::router::build_app_router;
use vidgen_api::state::AppState;
use vidgen_core::job::{JobRecord, VideoRequest};
use vidgen_core::types::JobId;
use vidgen_pipeline::collaborators::{
    ArtifactHandle, CollaboratorError, Collaborators, ContentSynthesizer, Renderer,
};
use vidgen_pipeline::config::PipelineConfig;
use vidgen_pipeline::orchestrator::JobOrchestrator;
use vidgen_render::artifact_store::LocalArtifactStore;
use vidgen_render::config::RenderConfig;

pub const SCRIPT: &str = "from manim import *\nclass Demo(Scene):\n    def construct(self):\n        pass\n";
pub const VIDEO_BYTES: usize = 4096;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: [127, 0, 0, 1].into(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout: Duration::from_secs(30),
        shutdown_grace: Duration::from_secs(5),
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

pub struct StubSynthesizer {
    pub delay: Duration,
    pub fail: bool,
}

#[async_trait]
impl ContentSynthesizer for StubSynthesizer {
    async fn synthesize(&self, _request: &VideoRequest) -> Result<String, CollaboratorError> {
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(CollaboratorError::Failed("model unavailable".into()));
        }
        Ok(SCRIPT.to_string())
    }
}

/// Writes a fixed-size fake mp4 into a scratch directory.
pub struct FileRenderer {
    pub scratch: std::path::PathBuf,
}

#[async_trait]
impl Renderer for FileRenderer {
    async fn render(&self, _script: &str, job_id: JobId) -> Result<ArtifactHandle, CollaboratorError> {
        let dir = self.scratch.join(format!("manim_{job_id}"));
        tokio::fs::create_dir_all(&dir).await?;
        let video = dir.join("scene.mp4");
        tokio::fs::write(&video, vec![7u8; VIDEO_BYTES]).await?;
        Ok(ArtifactHandle::new(video).with_scratch_dir(dir))
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub router: Router,
    pub orchestrator: Arc<JobOrchestrator>,
    pub dir: TempDir,
}

pub struct TestOptions {
    pub synthesis_delay: Duration,
    pub synthesis_fails: bool,
    pub ceiling: usize,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            synthesis_delay: Duration::ZERO,
            synthesis_fails: false,
            ceiling: 2,
        }
    }
}

/// Build the full application router over stub collaborators and a real
/// on-disk artifact store in a temp directory.
pub fn build_test_app(options: TestOptions) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let render = RenderConfig {
        manim_binary: "definitely-not-manim-vidgen".into(),
        temp_dir: dir.path().join("scratch"),
        videos_dir: dir.path().join("videos"),
        process_timeout: Duration::from_secs(5),
    };

    let collaborators = Collaborators {
        synthesizer: Arc::new(StubSynthesizer {
            delay: options.synthesis_delay,
            fail: options.synthesis_fails,
        }),
        renderer: Arc::new(FileRenderer {
            scratch: render.temp_dir.clone(),
        }),
        store: Arc::new(LocalArtifactStore::new(render.videos_dir.clone())),
    };
    let pipeline = PipelineConfig {
        max_concurrent_jobs: options.ceiling,
        retention_window: Duration::from_secs(3600),
        ..PipelineConfig::default()
    };
    let orchestrator = Arc::new(JobOrchestrator::new(&pipeline, collaborators));

    let config = test_config();
    let state = AppState {
        orchestrator: Arc::clone(&orchestrator),
        config: Arc::new(config.clone()),
        pipeline: Arc::new(pipeline),
        render: Arc::new(render),
    };

    TestApp {
        router: build_app_router(state, &config),
        orchestrator,
        dir,
    }
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &TestApp, method: Method, uri: &str, body: Option<serde_json::Value>) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str) -> Response {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: &TestApp, uri: &str, body: serde_json::Value) -> Response {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn delete(app: &TestApp, uri: &str) -> Response {
    send(app, Method::DELETE, uri, None).await
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Submit a valid request and return the new job id.
pub async fn submit(app: &TestApp) -> JobId {
    let response = post_json(
        app,
        "/api/v1/videos",
        serde_json::json!({"prompt": "Explain how a binary heap keeps its ordering"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    json["data"]["video_id"].as_str().unwrap().parse().unwrap()
}

/// Poll until the job reaches a terminal status.
pub async fn wait_terminal(app: &TestApp, id: JobId) -> JobRecord {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let record = app.orchestrator.get_status(id).await.expect("job should exist");
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
