use std::sync::Arc;

use tokio::sync::Mutex;
use vidgen_core::job::JobRecord;

use crate::error::PipelineError;
use crate::registry::JobRegistry;

/// Default number of jobs allowed in a non-terminal status at once.
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 2;

/// Gates job creation on the number of active jobs.
///
/// The count and the insert happen under one async mutex, so two
/// concurrent submissions can never both observe a free slot. Other
/// registry writers only ever lower the active count.
pub struct AdmissionController {
    registry: Arc<JobRegistry>,
    ceiling: usize,
    gate: Mutex<()>,
}

impl AdmissionController {
    pub fn new(registry: Arc<JobRegistry>, ceiling: usize) -> Self {
        Self {
            registry,
            ceiling,
            gate: Mutex::new(()),
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Whether a submission made now would be admitted. Advisory only.
    pub async fn try_admit(&self) -> bool {
        self.registry.count_active().await < self.ceiling
    }

    /// Insert `record` if the ceiling allows it.
    pub async fn admit(&self, record: JobRecord) -> Result<JobRecord, PipelineError> {
        let _gate = self.gate.lock().await;
        let active = self.registry.count_active().await;
        if active >= self.ceiling {
            tracing::warn!(active, ceiling = self.ceiling, "Admission rejected");
            return Err(PipelineError::AdmissionRejected {
                active,
                ceiling: self.ceiling,
            });
        }
        self.registry.create(record).await
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use vidgen_core::job::{JobPatch, VideoRequest};

    use super::*;

    fn record() -> JobRecord {
        JobRecord::new(uuid::Uuid::new_v4(), VideoRequest::new("Explain prime factorisation"))
    }

    #[tokio::test]
    async fn third_job_rejected_until_one_terminates() {
        let registry = Arc::new(JobRegistry::new());
        let admission = AdmissionController::new(Arc::clone(&registry), 2);

        let first = admission.admit(record()).await.unwrap();
        admission.admit(record()).await.unwrap();
        assert!(!admission.try_admit().await);
        assert_matches!(
            admission.admit(record()).await,
            Err(PipelineError::AdmissionRejected { active: 2, ceiling: 2 })
        );
        assert_eq!(registry.len().await, 2);

        registry
            .update(first.id, JobPatch::failed("failed", "boom"))
            .await
            .unwrap();
        assert!(admission.try_admit().await);
        admission.admit(record()).await.unwrap();
        assert_eq!(registry.count_active().await, 2);
    }

    #[tokio::test]
    async fn concurrent_submissions_never_exceed_ceiling() {
        let registry = Arc::new(JobRegistry::new());
        let admission = Arc::new(AdmissionController::new(Arc::clone(&registry), 3));

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let admission = Arc::clone(&admission);
                tokio::spawn(async move { admission.admit(record()).await.is_ok() })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 3);
        assert_eq!(registry.count_active().await, 3);
    }
}
