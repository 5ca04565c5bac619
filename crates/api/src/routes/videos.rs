//! Route definitions for video jobs.
//!
//! Mounted at `/videos`.
//!
//! ```text
//! POST   /                 create_video
//! GET    /                 list_videos (?status=)
//! GET    /{id}/status      get_status
//! GET    /{id}/download    download_video
//! GET    /{id}/script      get_script
//! DELETE /{id}             delete_video
//! ```

use axum::routing::{delete, get};
use axum::Router;

use crate::handlers::videos;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(videos::list_videos).post(videos::create_video))
        .route("/{id}", delete(videos::delete_video))
        .route("/{id}/status", get(videos::get_status))
        .route("/{id}/download", get(videos::download_video))
        .route("/{id}/script", get(videos::get_script))
}
