pub mod error;
pub mod job;
pub mod job_events;
pub mod types;
