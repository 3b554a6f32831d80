//! Ollama `/api/generate` adapter.

use super::{CompletionClient, CompletionRequest, LlmClientError};
use crate::http::RetryPolicy;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};

/// Non-streaming completion client for a local Ollama runtime.
pub struct OllamaCompletionClient {
    http: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl OllamaCompletionClient {
    /// Build a client against an Ollama base URL.
    pub fn new(http: Client, base_url: &str, retry: RetryPolicy) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    fn payload(request: &CompletionRequest) -> Value {
        let mut options = Map::new();
        options.insert("temperature".into(), json!(request.temperature));
        if let Some(max_tokens) = request.max_tokens {
            options.insert("num_predict".into(), json!(max_tokens));
        }

        let mut payload = json!({
            "model": request.model,
            "prompt": request.prompt,
            "stream": false,
            "options": options,
        });
        if let Some(system) = request.system.as_ref() {
            payload["system"] = json!(system);
        }
        payload
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl CompletionClient for OllamaCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmClientError> {
        let payload = Self::payload(&request);

        let response = self
            .retry
            .send("ollama generate", || self.http.post(self.endpoint()).json(&payload))
            .await
            .map_err(|error| {
                LlmClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(LlmClientError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            LlmClientError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;

        if !body.done {
            return Err(LlmClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response.trim().to_string())
    }
}
