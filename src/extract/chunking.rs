//! Chunk-size heuristics and semantic chunking for extracted text.
//!
//! Extracted pages are cut into segments that fit the summarizer and embedding budgets.
//!
//! - Automatic sizing: derive a budget from the embedding model's context window and clamp to
//!   a conservative range; `TEXT_SPLITTER_CHUNK_SIZE` overrides it.
//! - Safe defaults: `TEXT_SPLITTER_USE_SAFE_DEFAULTS=1` uses `window/8` instead of `window/4`.
//! - Overlap: `TEXT_SPLITTER_CHUNK_OVERLAP` prepends the tail of the previous segment, trimmed so
//!   the segment still fits the budget.
//! - Token counting: `tiktoken-rs` for OpenAI/known encodings, whitespace counting otherwise.

use crate::config::{Config, EmbeddingProvider};
use anyhow::Error as TokenizerError;
use semchunk_rs::Chunker;
use std::sync::Arc;
use thiserror::Error;
use tiktoken_rs::{
    CoreBPE, cl100k_base, get_bpe_from_model, model::get_context_size, o200k_base, p50k_base,
    p50k_edit, r50k_base,
};

type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

const MIN_AUTOMATIC_CHUNK_SIZE: usize = 256;
const MAX_AUTOMATIC_CHUNK_SIZE: usize = 1024;
const LOCAL_CONTEXT_WINDOW: usize = 2048;

/// Errors produced while turning extracted text into segments.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Configuration asked for an impossible token budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Tokenizer resources were unavailable for the configured model.
    #[error("failed to initialize tokenizer for model '{model}': {source}")]
    Tokenizer {
        /// Embedding model we attempted to load.
        model: String,
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
}

/// Token-budgeted semantic splitter. Build once; the tokenizer load is the expensive part.
#[derive(Clone)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
    counter: TokenCounter,
}

impl std::fmt::Debug for TextChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextChunker")
            .field("chunk_size", &self.chunk_size)
            .field("overlap", &self.overlap)
            .finish_non_exhaustive()
    }
}

impl TextChunker {
    /// Build a chunker for the embedding provider/model in `config`.
    pub fn from_config(config: &Config) -> Result<Self, ChunkingError> {
        let chunk_size = determine_chunk_size(
            config.text_splitter_chunk_size,
            config.embedding_provider,
            &config.embedding_model,
            config.text_splitter_use_safe_defaults,
        );
        let overlap = config.text_splitter_chunk_overlap.unwrap_or(0);
        tracing::debug!(
            chunk_size,
            override = config.text_splitter_chunk_size,
            provider = ?config.embedding_provider,
            model = %config.embedding_model,
            overlap,
            use_safe_defaults = config.text_splitter_use_safe_defaults,
            "Derived chunk size"
        );
        let counter = build_token_counter(config.embedding_provider, &config.embedding_model)?;
        Self::with_counter(chunk_size, overlap, counter)
    }

    /// Build a chunker that counts whitespace-separated words.
    pub fn whitespace(chunk_size: usize, overlap: usize) -> Result<Self, ChunkingError> {
        Self::with_counter(chunk_size, overlap, default_token_counter())
    }

    fn with_counter(
        chunk_size: usize,
        overlap: usize,
        counter: TokenCounter,
    ) -> Result<Self, ChunkingError> {
        if chunk_size == 0 {
            return Err(ChunkingError::InvalidChunkSize);
        }
        Ok(Self {
            chunk_size,
            overlap,
            counter,
        })
    }

    /// Split `text` into segments no larger than the token budget.
    ///
    /// Returns an empty vector when the input is all whitespace.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let counter_for_chunker = self.counter.clone();
        let chunker = Chunker::new(
            self.chunk_size,
            Box::new(move |segment: &str| counter_for_chunker.as_ref()(segment)),
        );
        let base_chunks = chunker
            .chunk(text)
            .into_iter()
            .filter(|chunk| !chunk.trim().is_empty())
            .collect();
        apply_overlap(base_chunks, self.chunk_size, self.overlap, &self.counter)
    }
}

/// Determine the chunk size, respecting overrides and safe defaults.
///
/// An explicit override wins (clamped to `>= 1`). Otherwise the provider/model context window is
/// divided by `4` (or `8` with safe defaults) and clamped into `[256, 1024]`.
pub(crate) fn determine_chunk_size(
    override_size: Option<usize>,
    provider: EmbeddingProvider,
    model: &str,
    use_safe_defaults: bool,
) -> usize {
    if let Some(explicit) = override_size {
        return explicit.max(1);
    }

    let window = embedding_context_window(provider, model);
    let divisor = if use_safe_defaults { 8 } else { 4 };
    (window / divisor).clamp(MIN_AUTOMATIC_CHUNK_SIZE, MAX_AUTOMATIC_CHUNK_SIZE)
}

fn embedding_context_window(provider: EmbeddingProvider, model: &str) -> usize {
    match provider {
        EmbeddingProvider::OpenAI => openai_embedding_context_window(model),
        EmbeddingProvider::Ollama => ollama_embedding_context_window(model),
        EmbeddingProvider::Local => LOCAL_CONTEXT_WINDOW,
    }
}

fn openai_embedding_context_window(model: &str) -> usize {
    if model.starts_with("text-embedding-3") || model.starts_with("text-embedding-ada-002") {
        return 8192;
    }
    get_context_size(model)
}

fn ollama_embedding_context_window(model: &str) -> usize {
    let normalized = model.to_lowercase();
    match normalized.as_str() {
        "nomic-embed-text" | "mxbai-embed-large" | "mxbai-embed-large-v1" => 8192,
        value if value.contains("all-minilm") => 512,
        value if value.contains("e5-large") => 4096,
        _ => {
            tracing::trace!(model, "Using default Ollama context window estimate");
            4096
        }
    }
}

/// Uses OpenAI encodings when possible and falls back to whitespace counting for the local
/// encoder and for Ollama models without a known tokenizer.
fn build_token_counter(
    provider: EmbeddingProvider,
    model: &str,
) -> Result<TokenCounter, ChunkingError> {
    match provider {
        EmbeddingProvider::OpenAI => build_tiktoken_counter(model),
        EmbeddingProvider::Local => Ok(default_token_counter()),
        EmbeddingProvider::Ollama => match build_tiktoken_counter(model) {
            Ok(counter) => Ok(counter),
            Err(error) => {
                tracing::warn!(
                    model,
                    error = %error,
                    "Tokenizer unavailable for Ollama model; falling back to whitespace counter"
                );
                Ok(default_token_counter())
            }
        },
    }
}

fn build_tiktoken_counter(model: &str) -> Result<TokenCounter, ChunkingError> {
    let normalized = model.trim();
    let target = if normalized.is_empty() {
        "cl100k_base"
    } else {
        normalized
    };
    let encoding = resolve_encoding(target).map_err(|source| ChunkingError::Tokenizer {
        model: target.to_string(),
        source,
    })?;
    let encoding = Arc::new(encoding);

    Ok(Arc::new(move |segment: &str| {
        encoding.encode_ordinary(segment).len()
    }))
}

fn resolve_encoding(model: &str) -> Result<CoreBPE, TokenizerError> {
    match get_bpe_from_model(model) {
        Ok(encoding) => Ok(encoding),
        Err(model_err) => {
            tracing::debug!(
                model,
                error = %model_err,
                "Tokenizer model lookup failed; trying encoding name"
            );
            match model {
                "cl100k_base" => cl100k_base(),
                "o200k_base" => o200k_base(),
                "p50k_base" => p50k_base(),
                "p50k_edit" => p50k_edit(),
                "r50k_base" | "gpt2" => r50k_base(),
                _ => {
                    tracing::warn!(model, "Falling back to 'cl100k_base' encoding");
                    cl100k_base()
                }
            }
        }
    }
}

fn default_token_counter() -> TokenCounter {
    Arc::new(|segment: &str| {
        let tokens = segment.split_whitespace().count();
        if tokens == 0 && !segment.is_empty() {
            1
        } else {
            tokens
        }
    })
}

fn apply_overlap(
    chunks: Vec<String>,
    chunk_size: usize,
    overlap: usize,
    token_counter: &TokenCounter,
) -> Vec<String> {
    let effective_overlap = overlap.min(chunk_size.saturating_sub(1));
    if effective_overlap == 0 {
        return chunks;
    }

    let mut iter = chunks.into_iter();
    let Some(mut previous) = iter.next() else {
        return Vec::new();
    };
    let mut overlapped = vec![previous.clone()];

    for current in iter {
        let tail = tail_with_token_limit(&previous, effective_overlap, token_counter);
        let mut combined = String::with_capacity(tail.len() + current.len() + 1);
        if !tail.is_empty() {
            combined.push_str(tail);
            if !tail.ends_with(char::is_whitespace) && !current.starts_with(char::is_whitespace) {
                combined.push(' ');
            }
        }
        combined.push_str(&current);
        overlapped.push(trim_to_token_budget(&combined, chunk_size, token_counter).to_string());
        previous = current;
    }

    overlapped
}

/// Longest suffix of `text` (starting on a char boundary, leading whitespace trimmed) that fits
/// within `token_limit`.
fn tail_with_token_limit<'a>(
    text: &'a str,
    token_limit: usize,
    token_counter: &TokenCounter,
) -> &'a str {
    if token_limit == 0 {
        return "";
    }
    text.char_indices()
        .map(|(offset, _)| text[offset..].trim_start())
        .find(|candidate| token_counter.as_ref()(candidate) <= token_limit)
        .unwrap_or("")
}

fn trim_to_token_budget<'a>(
    text: &'a str,
    token_budget: usize,
    token_counter: &TokenCounter,
) -> &'a str {
    tail_with_token_limit(text, token_budget, token_counter)
}
