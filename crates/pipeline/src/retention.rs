//! Eviction of finished jobs past the retention window.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use vidgen_core::job_events::MSG_TYPE_JOB_DELETED;
use vidgen_core::types::Timestamp;

use crate::collaborators::ArtifactStore;
use crate::events::{JobEvent, JobEventBus};
use crate::registry::JobRegistry;

/// Default retention window: 7 days.
pub const DEFAULT_RETENTION_WINDOW: Duration = Duration::from_secs(7 * 24 * 3600);

/// Default interval between periodic sweeps: 1 hour.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Report returned after a sweep completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Records examined.
    pub scanned: usize,
    /// Records removed from the registry.
    pub deleted: usize,
    /// One entry per record kept because its artifact could not be removed.
    pub errors: Vec<String>,
}

#[derive(Clone)]
pub struct RetentionSweeper {
    registry: Arc<JobRegistry>,
    store: Arc<dyn ArtifactStore>,
    events: Arc<JobEventBus>,
}

impl RetentionSweeper {
    pub fn new(
        registry: Arc<JobRegistry>,
        store: Arc<dyn ArtifactStore>,
        events: Arc<JobEventBus>,
    ) -> Self {
        Self {
            registry,
            store,
            events,
        }
    }

    /// Evict terminal jobs created more than `window` ago.
    pub async fn sweep(&self, window: Duration) -> SweepReport {
        let now = Utc::now();
        let cutoff = chrono::Duration::from_std(window)
            .ok()
            .and_then(|w| now.checked_sub_signed(w))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.sweep_before(cutoff).await
    }

    /// Evict terminal jobs created strictly before `cutoff`.
    ///
    /// A record whose artifact cannot be removed is kept so the next sweep
    /// retries it. Active jobs are never touched.
    pub async fn sweep_before(&self, cutoff: Timestamp) -> SweepReport {
        let records = self.registry.list(None).await;
        let mut report = SweepReport {
            scanned: records.len(),
            ..Default::default()
        };

        for record in records
            .into_iter()
            .filter(|r| r.is_terminal() && r.created_at < cutoff)
        {
            if let Some(artifact) = &record.artifact_ref {
                if let Err(e) = self.store.remove(artifact).await {
                    tracing::warn!(
                        job_id = %record.id,
                        %artifact,
                        error = %e,
                        "Retention: artifact removal failed, keeping record",
                    );
                    report.errors.push(format!("{}: {e}", record.id));
                    continue;
                }
            }
            if let Some(removed) = self.registry.delete(record.id).await {
                self.events
                    .publish(JobEvent::from_record(MSG_TYPE_JOB_DELETED, &removed));
                report.deleted += 1;
            }
        }

        if report.deleted > 0 || !report.errors.is_empty() {
            tracing::info!(
                scanned = report.scanned,
                deleted = report.deleted,
                errors = report.errors.len(),
                "Retention sweep finished",
            );
        } else {
            tracing::debug!(scanned = report.scanned, "Retention sweep: nothing to evict");
        }
        report
    }

    /// Sweep every `interval` until `cancel` is triggered.
    pub async fn run(&self, interval: Duration, window: Duration, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = interval.as_secs(),
            window_secs = window.as_secs(),
            "Retention sweeper started",
        );

        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Retention sweeper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.sweep(window).await;
                }
            }
        }
    }
}
