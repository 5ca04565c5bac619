//! Job orchestration for video generation.
//!
//! [`orchestrator::JobOrchestrator`] is the entry point: it admits requests
//! against a concurrency ceiling, runs each job through the stage pipeline
//! on a tracked task, answers status queries and evicts old jobs.

pub mod admission;
pub mod collaborators;
pub mod config;
pub mod driver;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod registry;
pub mod retention;
pub mod stage;
