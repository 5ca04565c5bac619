use std::sync::Arc;

use vidgen_pipeline::config::PipelineConfig;
use vidgen_pipeline::orchestrator::JobOrchestrator;
use vidgen_render::config::RenderConfig;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything lives behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Owner of the job registry and every running pipeline.
    pub orchestrator: Arc<JobOrchestrator>,
    pub config: Arc<ServerConfig>,
    /// Retention window used by manual cleanup.
    pub pipeline: Arc<PipelineConfig>,
    /// Tool locations reported by the health endpoint.
    pub render: Arc<RenderConfig>,
}
