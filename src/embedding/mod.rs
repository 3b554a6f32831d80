use crate::config::{Config, EmbeddingProvider};
use crate::http::{RetryPolicy, build_client};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

mod ollama;
mod openai;

pub use ollama::OllamaEmbeddingClient;
pub use openai::OpenAiEmbeddingClient;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider could not be reached.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider answered with a payload we could not use.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
    /// Client could not be constructed from the current configuration.
    #[error("Embedding client misconfigured: {0}")]
    Configuration(String),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;

    /// Label recorded in index manifests, e.g. `openai/text-embedding-3-small`.
    fn model_label(&self) -> String;
}

/// Deterministic feature-hashing encoder used for offline runs and tests.
///
/// Each lowercase alphanumeric token is hashed into one of `dimension` buckets with a hashed
/// sign, and the result is L2-normalized. Texts sharing vocabulary land close together.
pub struct LocalHashClient {
    dimension: usize,
}

impl LocalHashClient {
    /// Construct an encoder producing vectors of `dimension` components.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for LocalHashClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        if texts.is_empty() {
            return Err(EmbeddingClientError::GenerationFailed(
                "no texts provided".to_string(),
            ));
        }

        Ok(texts
            .iter()
            .map(|text| Self::encode(text, self.dimension))
            .collect())
    }

    fn model_label(&self) -> String {
        format!("local/hash-{}", self.dimension)
    }
}

/// `dimensions` is only accepted by the `text-embedding-3` family; older and compatible models
/// reject the field, so it is left out for them.
fn requested_dimensions(model: &str, dimension: usize) -> Option<usize> {
    model
        .rsplit('/')
        .next()
        .is_some_and(|name| name.starts_with("text-embedding-3"))
        .then_some(dimension)
}

/// Build the embedding client selected by configuration.
///
/// The client is constructed once per process and shared by the index and the retrieval path.
pub fn build_embedding_client(
    config: &Config,
) -> Result<Arc<dyn EmbeddingClient>, EmbeddingClientError> {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let retry = RetryPolicy::new(config.request_max_retries);
    tracing::debug!(
        provider = ?config.embedding_provider,
        model = %config.embedding_model,
        dimension = config.embedding_dimension,
        "Building embedding client"
    );

    match config.embedding_provider {
        EmbeddingProvider::Local => Ok(Arc::new(LocalHashClient::new(config.embedding_dimension))),
        EmbeddingProvider::OpenAI => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                EmbeddingClientError::Configuration("OPENAI_API_KEY is not set".into())
            })?;
            let http = build_client("sumdex/embed", timeout)
                .map_err(|error| EmbeddingClientError::Configuration(error.to_string()))?;
            Ok(Arc::new(OpenAiEmbeddingClient::new(
                http,
                &config.openai_base_url,
                api_key,
                config.embedding_model.clone(),
                requested_dimensions(&config.embedding_model, config.embedding_dimension),
                retry,
            )))
        }
        EmbeddingProvider::Ollama => {
            let http = build_client("sumdex/embed", timeout)
                .map_err(|error| EmbeddingClientError::Configuration(error.to_string()))?;
            Ok(Arc::new(OllamaEmbeddingClient::new(
                http,
                &config.ollama_url,
                config.embedding_model.clone(),
                retry,
            )))
        }
    }
}
