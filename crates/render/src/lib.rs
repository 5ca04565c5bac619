//! Manim rendering and local video storage.

pub mod artifact_store;
pub mod config;
pub mod manim;
pub mod probe;
pub mod scene;
pub mod subprocess;
