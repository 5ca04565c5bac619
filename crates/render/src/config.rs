use std::path::PathBuf;
use std::time::Duration;

/// Rendering and storage settings loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    /// Manim executable (default: `manim`).
    pub manim_binary: String,
    /// Parent directory for per-job scratch directories
    /// (default: `<system temp>/manim_videos`).
    pub temp_dir: PathBuf,
    /// Where finished videos are kept (default: `generated_videos`).
    pub videos_dir: PathBuf,
    /// Limit on a single Manim run (default: `300` seconds).
    pub process_timeout: Duration,
}

impl RenderConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var               | Default                      |
    /// |-----------------------|------------------------------|
    /// | `MANIM_BINARY`        | `manim`                      |
    /// | `TEMP_DIR`            | `<system temp>/manim_videos` |
    /// | `VIDEOS_DIR`          | `generated_videos`           |
    /// | `RENDER_TIMEOUT_SECS` | `300`                        |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let manim_binary = std::env::var("MANIM_BINARY").unwrap_or(defaults.manim_binary);
        let temp_dir = std::env::var("TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.temp_dir);
        let videos_dir = std::env::var("VIDEOS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.videos_dir);
        let timeout_secs: u64 = std::env::var("RENDER_TIMEOUT_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("RENDER_TIMEOUT_SECS must be a valid u64");

        Self {
            manim_binary,
            temp_dir,
            videos_dir,
            process_timeout: Duration::from_secs(timeout_secs),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            manim_binary: "manim".into(),
            temp_dir: std::env::temp_dir().join("manim_videos"),
            videos_dir: PathBuf::from("generated_videos"),
            process_timeout: Duration::from_secs(300),
        }
    }
}
