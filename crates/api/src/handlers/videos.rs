//! Handlers for the `/videos` resource plus stats and manual cleanup.

use std::collections::BTreeMap;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use vidgen_core::job::{JobRecord, JobStatus, VideoRequest};
use vidgen_core::types::{JobId, Timestamp};
use vidgen_pipeline::retention::SweepReport;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Response / query types
// ---------------------------------------------------------------------------

/// Public view of a job.
#[derive(Debug, Serialize)]
pub struct VideoResponse {
    pub video_id: JobId,
    pub status: JobStatus,
    pub message: String,
    /// Status URL right after submission, download URL once completed.
    pub video_url: Option<String>,
    pub created_at: Timestamp,
    pub progress: u8,
    pub degraded: bool,
    pub error_details: Option<String>,
}

impl VideoResponse {
    fn from_record(record: JobRecord, video_url: Option<String>) -> Self {
        Self {
            video_id: record.id,
            status: record.status,
            message: record.message,
            video_url,
            created_at: record.created_at,
            progress: record.progress,
            degraded: record.degraded,
            error_details: record.error_detail,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VideoSummary {
    pub video_id: JobId,
    pub status: JobStatus,
    pub message: String,
    pub created_at: Timestamp,
    pub progress: u8,
    pub download_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VideoList {
    pub videos: Vec<VideoSummary>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ScriptResponse {
    pub video_id: JobId,
    pub script_content: String,
    pub status: JobStatus,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_videos: usize,
    pub active_videos: usize,
    pub status_breakdown: BTreeMap<JobStatus, usize>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub message: String,
    pub report: SweepReport,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<JobStatus>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn status_url(id: JobId) -> String {
    format!("/api/v1/videos/{id}/status")
}

fn download_url(record: &JobRecord) -> Option<String> {
    (record.status == JobStatus::Completed).then(|| format!("/api/v1/videos/{}/download", record.id))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/videos
pub async fn create_video(
    State(state): State<AppState>,
    Json(request): Json<VideoRequest>,
) -> AppResult<Json<DataResponse<VideoResponse>>> {
    let record = state.orchestrator.submit(request).await?;
    let url = status_url(record.id);
    Ok(Json(DataResponse {
        data: VideoResponse::from_record(record, Some(url)),
    }))
}

/// GET /api/v1/videos/{id}/status
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<Json<DataResponse<VideoResponse>>> {
    let record = state.orchestrator.get_status(id).await?;
    let url = download_url(&record);
    Ok(Json(DataResponse {
        data: VideoResponse::from_record(record, url),
    }))
}

/// GET /api/v1/videos/{id}/download
///
/// Streams the finished MP4 as an attachment.
pub async fn download_video(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<Response> {
    let artifact = state.orchestrator.get_artifact(id).await?;
    let path = state.orchestrator.artifact_path(&artifact);

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(job_id = %id, path = %path.display(), "Completed video missing on disk");
            return Err(AppError::NotFound("Video file not found".into()));
        }
        Err(e) => return Err(AppError::InternalError(e.to_string())),
    };
    let file_size = file
        .metadata()
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .len();

    let headers = [
        (header::CONTENT_TYPE, "video/mp4".to_string()),
        (header::CONTENT_LENGTH, file_size.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"educational_video_{id}.mp4\""),
        ),
    ];
    Ok((headers, Body::from_stream(ReaderStream::new(file))).into_response())
}

/// GET /api/v1/videos/{id}/script
pub async fn get_script(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<Json<DataResponse<ScriptResponse>>> {
    let script_content = state.orchestrator.get_script(id).await?;
    let record = state.orchestrator.get_status(id).await?;
    Ok(Json(DataResponse {
        data: ScriptResponse {
            video_id: id,
            script_content,
            status: record.status,
        },
    }))
}

/// DELETE /api/v1/videos/{id}
///
/// 404 when the job is unknown, 409 while it is still running.
pub async fn delete_video(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<Json<DataResponse<MessageResponse>>> {
    if !state.orchestrator.delete_job(id).await? {
        return Err(AppError::NotFound(format!("Video {id} not found")));
    }
    Ok(Json(DataResponse {
        data: MessageResponse {
            message: "Video deleted successfully".into(),
        },
    }))
}

/// GET /api/v1/videos?status=
pub async fn list_videos(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<DataResponse<VideoList>> {
    let videos: Vec<VideoSummary> = state
        .orchestrator
        .list_jobs(params.status)
        .await
        .into_iter()
        .map(|record| VideoSummary {
            download_url: download_url(&record),
            video_id: record.id,
            status: record.status,
            message: record.message,
            created_at: record.created_at,
            progress: record.progress,
        })
        .collect();
    let total = videos.len();
    Json(DataResponse {
        data: VideoList { videos, total },
    })
}

/// GET /api/v1/stats
pub async fn get_stats(State(state): State<AppState>) -> Json<DataResponse<StatsResponse>> {
    let stats = state.orchestrator.stats().await;
    Json(DataResponse {
        data: StatsResponse {
            total_videos: stats.total,
            active_videos: stats.active,
            status_breakdown: stats.per_status,
        },
    })
}

/// POST /api/v1/cleanup
///
/// Runs one retention sweep with the configured window.
pub async fn cleanup(State(state): State<AppState>) -> Json<DataResponse<CleanupResponse>> {
    let report = state
        .orchestrator
        .trigger_cleanup(state.pipeline.retention_window)
        .await;
    Json(DataResponse {
        data: CleanupResponse {
            message: "Cleanup completed".into(),
            report,
        },
    })
}
