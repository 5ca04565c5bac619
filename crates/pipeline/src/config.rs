use std::str::FromStr;
use std::time::Duration;

use crate::admission::DEFAULT_MAX_CONCURRENT_JOBS;
use crate::driver::{StagePlan, StageSpec, DEFAULT_RENDER_TIMEOUT, DEFAULT_SYNTHESIS_TIMEOUT};
use crate::retention::{DEFAULT_RETENTION_WINDOW, DEFAULT_SWEEP_INTERVAL};
use crate::stage::DEFAULT_STAGE_WORKERS;

/// Orchestration settings loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Admission ceiling on non-terminal jobs (default: `2`).
    pub max_concurrent_jobs: usize,
    /// Size of the stage worker pool (default: `3`).
    pub stage_workers: usize,
    /// Per-stage timeouts and fallback policy.
    pub plan: StagePlan,
    /// Age after which finished jobs are evicted (default: 7 days).
    pub retention_window: Duration,
    /// Interval between retention sweeps (default: 1 hour).
    pub cleanup_interval: Duration,
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default |
    /// |--------------------------|---------|
    /// | `MAX_CONCURRENT_VIDEOS`  | `2`     |
    /// | `STAGE_WORKERS`          | `3`     |
    /// | `SYNTHESIS_TIMEOUT_SECS` | `780`   |
    /// | `RENDER_TIMEOUT_SECS`    | `300`   |
    /// | `SYNTHESIS_FALLBACK`     | `false` |
    /// | `RENDER_FALLBACK`        | `false` |
    /// | `VIDEO_RETENTION_DAYS`   | `7`     |
    /// | `CLEANUP_INTERVAL_SECS`  | `3600`  |
    pub fn from_env() -> Self {
        let max_concurrent_jobs = env_or("MAX_CONCURRENT_VIDEOS", DEFAULT_MAX_CONCURRENT_JOBS);
        let stage_workers = env_or("STAGE_WORKERS", DEFAULT_STAGE_WORKERS);

        let synthesis = StageSpec::new(Duration::from_secs(env_or(
            "SYNTHESIS_TIMEOUT_SECS",
            DEFAULT_SYNTHESIS_TIMEOUT.as_secs(),
        )))
        .with_fallback(env_or("SYNTHESIS_FALLBACK", false));

        let render = StageSpec::new(Duration::from_secs(env_or(
            "RENDER_TIMEOUT_SECS",
            DEFAULT_RENDER_TIMEOUT.as_secs(),
        )))
        .with_fallback(env_or("RENDER_FALLBACK", false));

        let retention_days: u64 =
            env_or("VIDEO_RETENTION_DAYS", DEFAULT_RETENTION_WINDOW.as_secs() / 86_400);
        let cleanup_interval_secs: u64 =
            env_or("CLEANUP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL.as_secs());

        Self {
            max_concurrent_jobs,
            stage_workers,
            plan: StagePlan { synthesis, render },
            retention_window: Duration::from_secs(retention_days * 86_400),
            cleanup_interval: Duration::from_secs(cleanup_interval_secs),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            stage_workers: DEFAULT_STAGE_WORKERS,
            plan: StagePlan::default(),
            retention_window: DEFAULT_RETENTION_WINDOW,
            cleanup_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// Read and parse `key`, falling back to `default` when it is unset.
///
/// Panics on a present but unparsable value, like the rest of startup
/// configuration.
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be a valid value: {e}")),
        Err(_) => default,
    }
}
