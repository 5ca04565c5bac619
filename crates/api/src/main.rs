use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vidgen_api::config::ServerConfig;
use vidgen_api::router::build_app_router;
use vidgen_api::state::AppState;
use vidgen_pipeline::collaborators::Collaborators;
use vidgen_pipeline::config::PipelineConfig;
use vidgen_pipeline::orchestrator::JobOrchestrator;
use vidgen_render::artifact_store::LocalArtifactStore;
use vidgen_render::config::RenderConfig;
use vidgen_render::manim::ManimRenderer;
use vidgen_synth::config::SynthConfig;
use vidgen_synth::synthesizer::ScriptSynthesizer;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "vidgen_api=debug,vidgen_pipeline=debug,vidgen_synth=info,vidgen_render=info,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let pipeline_config = PipelineConfig::from_env();
    let render_config = RenderConfig::from_env();
    let synth_config = SynthConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = config.port,
        max_concurrent_videos = pipeline_config.max_concurrent_jobs,
        stage_workers = pipeline_config.stage_workers,
        model = %synth_config.model,
        "Loaded configuration",
    );
    if synth_config.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set, every video will fail at script generation");
    }

    // --- Collaborators ---
    let store = LocalArtifactStore::new(render_config.videos_dir.clone());
    store
        .ensure_dir()
        .await
        .expect("Failed to create videos directory");
    tokio::fs::create_dir_all(&render_config.temp_dir)
        .await
        .expect("Failed to create temp directory");

    let collaborators = Collaborators {
        synthesizer: Arc::new(ScriptSynthesizer::from_config(&synth_config)),
        renderer: Arc::new(ManimRenderer::new(render_config.clone())),
        store: Arc::new(store),
    };
    let orchestrator = Arc::new(JobOrchestrator::new(&pipeline_config, collaborators));

    // --- Background tasks ---
    let cancel = CancellationToken::new();

    let sweeper = orchestrator.sweeper().clone();
    let retention_cancel = cancel.clone();
    let (interval, window) = (pipeline_config.cleanup_interval, pipeline_config.retention_window);
    let retention_handle = tokio::spawn(async move {
        sweeper.run(interval, window, retention_cancel).await;
    });

    let events_handle = tokio::spawn(log_job_events(Arc::clone(&orchestrator), cancel.clone()));
    tracing::info!("Background tasks started (retention sweeper, event log)");

    // --- App state ---
    let state = AppState {
        orchestrator: Arc::clone(&orchestrator),
        config: Arc::new(config.clone()),
        pipeline: Arc::new(pipeline_config),
        render: Arc::new(render_config),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = config.bind_addr();
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), retention_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), events_handle).await;
    tracing::info!("Background tasks stopped");

    let report = orchestrator
        .shutdown(config.shutdown_grace)
        .await;
    tracing::info!(
        in_flight = report.in_flight,
        abandoned = report.abandoned.len(),
        "Graceful shutdown complete",
    );
}

/// Mirror job lifecycle events into the log until cancelled.
async fn log_job_events(orchestrator: Arc<JobOrchestrator>, cancel: CancellationToken) {
    let mut rx = orchestrator.subscribe();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Ok(event) => tracing::debug!(
                    event_type = event.event_type,
                    job_id = %event.job_id,
                    status = %event.status,
                    progress = event.progress,
                    "Job event",
                ),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Job event log lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
