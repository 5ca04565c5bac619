//! Three-round script synthesis: generate, review, narrate.
//!
//! Only the first round is essential. A failed or slow review round keeps
//! the locally cleaned script, and a failed or slow narration round patches
//! the voiceover structure in locally.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use vidgen_core::job::VideoRequest;
use vidgen_pipeline::collaborators::{CollaboratorError, ContentSynthesizer};

use crate::clean::{
    add_basic_voiceover_structure, clean_script, ensure_voiceover, fix_common_issues, strip_fences,
};
use crate::client::{GeminiClient, ModelError, TextModel};
use crate::config::SynthConfig;
use crate::fallback::fallback_script;
use crate::prompt::{generation_prompt, validation_prompt, voiceover_prompt};

/// Why a single model round produced no text.
#[derive(Debug, thiserror::Error)]
enum RoundError {
    #[error("timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
    #[error(transparent)]
    Model(#[from] ModelError),
}

pub struct ScriptSynthesizer {
    model: Arc<dyn TextModel>,
    round_timeout: Duration,
}

impl ScriptSynthesizer {
    pub fn new(model: Arc<dyn TextModel>, round_timeout: Duration) -> Self {
        Self {
            model,
            round_timeout,
        }
    }

    /// Synthesizer backed by a [`GeminiClient`] built from `config`.
    pub fn from_config(config: &SynthConfig) -> Self {
        Self::new(Arc::new(GeminiClient::new(config)), config.round_timeout)
    }

    async fn round<F>(&self, round: &'static str, call: F) -> Result<String, RoundError>
    where
        F: Future<Output = Result<String, ModelError>>,
    {
        let started = Instant::now();
        let result = tokio::time::timeout(self.round_timeout, call).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(Ok(text)) => {
                tracing::info!(round, elapsed_ms, chars = text.len(), "Model round finished");
                Ok(text)
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(RoundError::Timeout { elapsed_ms }),
        }
    }
}

#[async_trait]
impl ContentSynthesizer for ScriptSynthesizer {
    async fn synthesize(&self, request: &VideoRequest) -> Result<String, CollaboratorError> {
        let prompt = generation_prompt(&request.prompt, request.duration_limit);
        let script = match self.round("generate", self.model.generate(&prompt)).await {
            Ok(raw) => clean_script(&raw),
            Err(RoundError::Timeout { elapsed_ms }) => {
                tracing::error!(elapsed_ms, "Script generation timed out");
                return Err(CollaboratorError::Timeout { elapsed_ms });
            }
            Err(e) => {
                tracing::error!(error = %e, "Script generation failed");
                return Err(CollaboratorError::Failed(format!(
                    "Failed to generate Manim script: {e}"
                )));
            }
        };

        let review = validation_prompt(&script);
        let script = match self.round("validate", self.model.generate(&review)).await {
            Ok(raw) => fix_common_issues(&strip_fences(&raw)),
            Err(e) => {
                tracing::warn!(error = %e, "Validation round failed, keeping cleaned script");
                script
            }
        };

        let narrate = voiceover_prompt(&script, &request.prompt);
        match self.round("voiceover", self.model.generate(&narrate)).await {
            Ok(raw) => Ok(ensure_voiceover(&fix_common_issues(&strip_fences(&raw)))),
            Err(e) => {
                tracing::warn!(error = %e, "Voiceover round failed, patching voiceover locally");
                Ok(add_basic_voiceover_structure(&script))
            }
        }
    }

    fn degraded(&self, request: &VideoRequest) -> Option<String> {
        Some(fallback_script(&request.prompt))
    }
}
