//! Uniform interface over the completion backends that generate questions.
//!
//! One completion request is issued per chunk. The concrete provider is
//! selected once at startup from configuration; everything downstream talks
//! to the [`CompletionClient`] trait. No retry happens at this layer: the
//! orchestrator decides how chunk failures are handled.

use crate::config::{Config, ModelProvider};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

mod ollama;
mod openai;

#[cfg(feature = "local-model")]
mod local;

#[cfg(not(feature = "local-model"))]
#[path = "local_stub.rs"]
mod local;

pub use local::LocalCompletionClient;
pub use ollama::OllamaCompletionClient;
pub use openai::OpenAiCompletionClient;

/// Default Ollama runtime address when no override is configured.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default hosted API base when no override is configured.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

/// Errors surfaced by completion providers.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Provider could not be reached or its model could not be loaded.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider answered with an error status or an undecodable body.
    #[error("Provider request failed: {0}")]
    ProviderError(String),
    /// Request exceeded the allowed time budget.
    #[error("Provider request timed out after {0}s")]
    Timeout(u64),
}

/// One completion invocation against the configured backend.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Role framing for the model.
    pub system: String,
    /// Task instructions and source text.
    pub user: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Interface implemented by completion backends.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Produce raw model text for the supplied request.
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;
}

/// Build the completion client selected by configuration.
///
/// Selection happens exactly once at process start; a missing credential or
/// weights path is reported as [`CompletionError::ProviderUnavailable`]
/// rather than a panic.
pub fn get_completion_client(
    config: &Config,
) -> Result<Arc<dyn CompletionClient>, CompletionError> {
    match config.llm_provider {
        ModelProvider::Ollama => {
            let base_url = config
                .ollama_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
            Ok(Arc::new(OllamaCompletionClient::new(
                base_url,
                config.model_name.clone(),
            )))
        }
        ModelProvider::OpenAi => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                CompletionError::ProviderUnavailable(
                    "OPENAI_API_KEY is required for the openai provider".to_string(),
                )
            })?;
            let base_url = config
                .openai_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string());
            Ok(Arc::new(OpenAiCompletionClient::new(
                base_url,
                api_key,
                config.model_name.clone(),
            )))
        }
        ModelProvider::Local => {
            let model_path = config.model_path.clone().ok_or_else(|| {
                CompletionError::ProviderUnavailable(
                    "MODEL_PATH is required for the local provider".to_string(),
                )
            })?;
            Ok(Arc::new(LocalCompletionClient::new(model_path.into())))
        }
    }
}

/// Collapse a system/user pair into the single-prompt framing used by
/// providers without native chat roles.
pub(crate) fn frame_single_prompt(request: &CompletionRequest) -> String {
    format!(
        "<|system|>\n{}\n<|user|>\n{}\n<|assistant|>\n",
        request.system, request.user
    )
}
