pub mod videos;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{health, videos as video_handlers};
use crate::state::AppState;

/// The full route tree.
///
/// ```text
/// GET  /                        service banner
/// GET  /health                  liveness
///
/// /api/v1/videos/...            see [`videos::router`]
/// GET  /api/v1/stats            counts per status
/// POST /api/v1/cleanup          run one retention sweep
/// GET  /api/v1/health           manim and ffmpeg probes
/// ```
pub fn app_routes() -> Router<AppState> {
    let api = Router::new()
        .nest("/videos", videos::router())
        .route("/stats", get(video_handlers::get_stats))
        .route("/cleanup", post(video_handlers::cleanup))
        .route("/health", get(health::service_health));

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::liveness))
        .nest("/api/v1", api)
}
