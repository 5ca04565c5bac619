//! In-process broadcast of job lifecycle events.
//!
//! [`JobEventBus`] wraps a `tokio::sync::broadcast` channel and is shared via
//! `Arc`. Publishing never blocks and never fails; events sent while nobody
//! listens are dropped.

use serde::Serialize;
use tokio::sync::broadcast;
use vidgen_core::job::{JobRecord, JobStatus};
use vidgen_core::types::{JobId, Timestamp};

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// A change in a job's lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobEvent {
    /// One of the `MSG_TYPE_JOB_*` constants in `vidgen_core::job_events`.
    pub event_type: &'static str,
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub timestamp: Timestamp,
}

impl JobEvent {
    /// Snapshot `record` as an event of the given type.
    pub fn from_record(event_type: &'static str, record: &JobRecord) -> Self {
        Self {
            event_type,
            job_id: record.id,
            status: record.status,
            progress: record.progress,
            message: record.message.clone(),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Fan-out bus for [`JobEvent`]s.
pub struct JobEventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl JobEventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// Slow receivers observe `RecvError::Lagged` once the buffer wraps.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: JobEvent) {
        // A send error only means there are no receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for JobEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
