//! Manim script synthesis backed by a hosted text model.

pub mod clean;
pub mod client;
pub mod config;
pub mod fallback;
pub mod prompt;
pub mod synthesizer;
