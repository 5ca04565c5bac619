use std::time::Duration;

/// Default Gemini REST endpoint.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default model used for every synthesis round.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-pro";

/// Text model settings loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthConfig {
    /// `None` disables synthesis; every request fails until a key is set.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// Limit on each individual model call (default: `240` seconds).
    pub round_timeout: Duration,
}

impl SynthConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                                      |
    /// |--------------------------------|----------------------------------------------|
    /// | `GEMINI_API_KEY`               | unset                                        |
    /// | `GEMINI_MODEL`                 | `gemini-2.5-pro`                             |
    /// | `GEMINI_BASE_URL`              | `https://generativelanguage.googleapis.com`  |
    /// | `SYNTHESIS_ROUND_TIMEOUT_SECS` | `240`                                        |
    pub fn from_env() -> Self {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.into());
        let base_url =
            std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_GEMINI_BASE_URL.into());
        let round_timeout_secs: u64 = std::env::var("SYNTHESIS_ROUND_TIMEOUT_SECS")
            .unwrap_or_else(|_| "240".into())
            .parse()
            .expect("SYNTHESIS_ROUND_TIMEOUT_SECS must be a valid u64");

        Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            round_timeout: Duration::from_secs(round_timeout_secs),
        }
    }
}
