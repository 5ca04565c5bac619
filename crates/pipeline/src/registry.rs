use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tokio::sync::RwLock;
use vidgen_core::job::{JobPatch, JobRecord, JobStatus};
use vidgen_core::types::JobId;

use crate::error::PipelineError;

/// Snapshot counts over the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub total: usize,
    pub active: usize,
    /// Count per status; every status is present, including zero counts.
    pub per_status: BTreeMap<JobStatus, usize>,
}

/// In-memory store of all known jobs.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared between the orchestrator, the drivers and the sweeper. Every
/// method takes the lock once and releases it before returning, so no
/// caller ever holds it across external work.
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a new record. Fails if a record with the same id exists.
    pub async fn create(&self, record: JobRecord) -> Result<JobRecord, PipelineError> {
        match self.jobs.write().await.entry(record.id) {
            Entry::Occupied(_) => Err(PipelineError::DuplicateId(record.id)),
            Entry::Vacant(slot) => Ok(slot.insert(record).clone()),
        }
    }

    pub async fn get(&self, id: JobId) -> Result<JobRecord, PipelineError> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(PipelineError::NotFound(id))
    }

    /// Apply `patch` to the record and return the updated copy.
    ///
    /// A patch that would break a record invariant is rejected whole and
    /// the stored record is left untouched.
    pub async fn update(&self, id: JobId, patch: JobPatch) -> Result<JobRecord, PipelineError> {
        let mut jobs = self.jobs.write().await;
        let record = jobs.get_mut(&id).ok_or(PipelineError::NotFound(id))?;
        record.apply(patch)?;
        Ok(record.clone())
    }

    /// Remove a record, handing it back so the caller can release its
    /// artifact. Absent ids yield `None`.
    pub async fn delete(&self, id: JobId) -> Option<JobRecord> {
        self.jobs.write().await.remove(&id)
    }

    /// All records, newest first, optionally restricted to one status.
    pub async fn list(&self, filter: Option<JobStatus>) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| filter.map_or(true, |status| job.status == status))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    /// Number of records in a non-terminal status.
    pub async fn count_active(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|job| job.status.is_active())
            .count()
    }

    pub async fn stats(&self) -> RegistryStats {
        let jobs = self.jobs.read().await;
        let mut per_status: BTreeMap<JobStatus, usize> =
            JobStatus::ALL.iter().map(|status| (*status, 0)).collect();
        for job in jobs.values() {
            *per_status.entry(job.status).or_default() += 1;
        }
        let active = JobStatus::ACTIVE
            .iter()
            .map(|status| per_status.get(status).copied().unwrap_or(0))
            .sum();
        RegistryStats {
            total: jobs.len(),
            active,
            per_status,
        }
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
