use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use vidgen_core::error::CoreError;
use vidgen_pipeline::error::PipelineError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`PipelineError`] for orchestration errors and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce consistent JSON error
/// responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A resource that exists in the registry but not on disk, or similar.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        AppError::Pipeline(PipelineError::Core(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Pipeline(err) => classify_pipeline_error(err),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

/// Map an orchestration error to an HTTP status, error code, and message.
fn classify_pipeline_error(err: &PipelineError) -> (StatusCode, &'static str, String) {
    match err {
        PipelineError::NotFound(id) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("Video {id} not found"),
        ),
        PipelineError::AdmissionRejected { .. } => (
            StatusCode::TOO_MANY_REQUESTS,
            "TOO_MANY_REQUESTS",
            "Maximum concurrent video generation limit reached. Please try again later."
                .to_string(),
        ),
        PipelineError::NotReady { .. } => (StatusCode::BAD_REQUEST, "NOT_READY", err.to_string()),
        PipelineError::JobActive { .. } => {
            (StatusCode::CONFLICT, "JOB_ACTIVE", err.to_string())
        }
        PipelineError::ShuttingDown => (
            StatusCode::SERVICE_UNAVAILABLE,
            "SHUTTING_DOWN",
            err.to_string(),
        ),
        PipelineError::Core(CoreError::Validation(msg)) => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
        }
        PipelineError::Core(CoreError::NotFound { entity, id }) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        PipelineError::DuplicateId(_)
        | PipelineError::ArtifactStore(_)
        | PipelineError::Core(_) => {
            tracing::error!(error = %err, "Pipeline error");
            internal()
        }
    }
}
