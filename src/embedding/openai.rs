//! OpenAI-compatible `/embeddings` adapter.

use super::{EmbeddingClient, EmbeddingClientError};
use crate::http::RetryPolicy;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Embeddings client for OpenAI and API-compatible servers.
pub struct OpenAiEmbeddingClient {
    http: Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimensions: Option<usize>,
    retry: RetryPolicy,
}

impl OpenAiEmbeddingClient {
    /// Build a client against `base_url` (for example `https://api.openai.com/v1`).
    pub fn new(
        http: Client,
        base_url: &str,
        api_key: String,
        model: String,
        dimensions: Option<usize>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            api_key,
            model,
            dimensions,
            retry,
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Err(EmbeddingClientError::GenerationFailed(
                "no texts provided".to_string(),
            ));
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: &texts,
            dimensions: self.dimensions,
        };

        let response = self
            .retry
            .send("openai embeddings", || {
                self.http
                    .post(&self.endpoint)
                    .bearer_auth(self.api_key.trim())
                    .json(&request)
            })
            .await
            .map_err(|error| {
                EmbeddingClientError::ProviderUnavailable(format!(
                    "failed to reach {}: {error}",
                    self.endpoint
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "OpenAI returned {status}: {body}"
            )));
        }

        let mut parsed: EmbeddingResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::InvalidResponse(format!(
                "failed to decode embedding response: {error}"
            ))
        })?;
        if parsed.data.len() != texts.len() {
            return Err(EmbeddingClientError::InvalidResponse(format!(
                "received {} embeddings for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }
        parsed.data.sort_by_key(|entry| entry.index);
        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }

    fn model_label(&self) -> String {
        format!("openai/{}", self.model)
    }
}
