use axum::extract::State;
use axum::Json;
use serde::Serialize;
use vidgen_render::probe::{probe_version, ToolStatus};

use crate::response::DataResponse;
use crate::state::AppState;

const SERVICE_NAME: &str = "Manim Video Generator API";

#[derive(Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub version: &'static str,
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Readiness of the rendering toolchain and current load.
#[derive(Serialize)]
pub struct ServiceHealth {
    /// `healthy` when manim and ffmpeg both run, `degraded` otherwise.
    pub status: &'static str,
    pub manim: ToolStatus,
    pub ffmpeg: ToolStatus,
    pub active_videos: usize,
    pub max_concurrent_videos: usize,
    pub temp_dir: String,
    pub videos_dir: String,
}

/// GET / -- service banner.
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
    })
}

/// GET /health -- liveness only, no external checks.
pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "ok",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /api/v1/health -- probes manim and ffmpeg.
pub async fn service_health(State(state): State<AppState>) -> Json<DataResponse<ServiceHealth>> {
    let (manim, ffmpeg) = futures::join!(
        probe_version(&state.render.manim_binary, "--version"),
        probe_version("ffmpeg", "-version"),
    );
    let stats = state.orchestrator.stats().await;

    let status = if manim.is_available() && ffmpeg.is_available() {
        "healthy"
    } else {
        "degraded"
    };

    Json(DataResponse {
        data: ServiceHealth {
            status,
            manim,
            ffmpeg,
            active_videos: stats.active,
            max_concurrent_videos: state.orchestrator.admission_ceiling(),
            temp_dir: state.render.temp_dir.display().to_string(),
            videos_dir: state.render.videos_dir.display().to_string(),
        },
    })
}
