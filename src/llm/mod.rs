//! Text generation providers shared by segment summarization and query answering.
//!
//! Both stages only need "prompt in, text out", so one trait covers them. When `LLM_PROVIDER` is
//! `none` no client is built and callers fall back to extractive output.

use crate::config::{Config, LlmProvider};
use crate::http::{RetryPolicy, build_client};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

mod ollama;
mod openai;

pub use ollama::OllamaCompletionClient;
pub use openai::OpenAiCompletionClient;

/// Errors surfaced while generating text.
#[derive(Debug, Error)]
pub enum LlmClientError {
    /// Provider was misconfigured or unreachable.
    #[error("Generation provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate text: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed or was empty.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Request payload passed to a generation provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model identifier understood by the provider.
    pub model: String,
    /// Optional system instruction.
    pub system: Option<String>,
    /// User prompt.
    pub prompt: String,
    /// Optional cap on generated tokens.
    pub max_tokens: Option<usize>,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Interface implemented by text generation providers.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate a completion for the request.
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmClientError>;
}

/// Build the generation client selected by configuration, or `None` for extractive mode.
pub fn build_completion_client(
    config: &Config,
) -> Result<Option<Arc<dyn CompletionClient>>, LlmClientError> {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let retry = RetryPolicy::new(config.request_max_retries);

    match config.llm_provider {
        LlmProvider::None => {
            tracing::info!("No LLM provider configured; using extractive summaries and answers");
            Ok(None)
        }
        LlmProvider::Ollama => {
            let http = build_client("sumdex/generate", timeout)
                .map_err(|error| LlmClientError::ProviderUnavailable(error.to_string()))?;
            Ok(Some(Arc::new(OllamaCompletionClient::new(
                http,
                &config.ollama_url,
                retry,
            ))))
        }
        LlmProvider::OpenAI => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                LlmClientError::ProviderUnavailable("OPENAI_API_KEY is not set".into())
            })?;
            let http = build_client("sumdex/generate", timeout)
                .map_err(|error| LlmClientError::ProviderUnavailable(error.to_string()))?;
            Ok(Some(Arc::new(OpenAiCompletionClient::new(
                http,
                &config.openai_base_url,
                api_key,
                retry,
            ))))
        }
    }
}
