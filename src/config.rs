use crate::extract::DEFAULT_MAX_FILE_SIZE;
use crate::processing::DEFAULT_TOP_K;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_RECORD_DB_PATH: &str = "documents.db";
const DEFAULT_COLLECTION_NAME: &str = "summary_vectors";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_SUMMARIZATION_MAX_WORDS: usize = 120;
const DEFAULT_GENERATION_MAX_TOKENS: usize = 512;
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_MAX_RETRIES: usize = 3;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for an ingestion run and its follow-up queries.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory whose direct entries are ingested.
    pub folder_path: PathBuf,
    /// Directory holding the summary vector collection.
    pub vector_db_path: PathBuf,
    /// SQLite file holding document metadata records.
    pub record_db_path: PathBuf,
    /// Name of the summary vector collection.
    pub collection_name: String,
    /// Optional ad-hoc query answered after ingestion.
    pub query: Option<String>,
    /// Embedding provider used to vectorize summaries and queries.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Provider backing both summarization and answer generation.
    pub llm_provider: LlmProvider,
    /// Model used to summarize segments.
    pub summarization_model: String,
    /// Word budget requested for each summary.
    pub summarization_max_words: usize,
    /// Model used to answer queries.
    pub generation_model: String,
    /// Token budget requested for each answer.
    pub generation_max_tokens: usize,
    /// Whether summaries are produced per segment or per file.
    pub summary_granularity: SummaryGranularity,
    /// Number of summaries retrieved per query.
    pub search_top_k: usize,
    /// Optional override for the automatic chunk size selection.
    pub text_splitter_chunk_size: Option<usize>,
    /// Optional token overlap between adjacent segments.
    pub text_splitter_chunk_overlap: Option<usize>,
    /// Use the conservative window/8 chunk size heuristic.
    pub text_splitter_use_safe_defaults: bool,
    /// Files larger than this are rejected by the extractor.
    pub max_file_size: u64,
    /// API key for OpenAI-compatible endpoints.
    pub openai_api_key: Option<String>,
    /// Base URL for OpenAI-compatible endpoints.
    pub openai_base_url: String,
    /// Base URL of the Ollama runtime.
    pub ollama_url: String,
    /// Attempts made for transient HTTP failures.
    pub request_max_retries: usize,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI embeddings API.
    OpenAI,
    /// Deterministic in-process hashing encoder; no network access.
    Local,
}

/// Supported text generation backends for summaries and answers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LlmProvider {
    /// No model; summaries and answers are assembled extractively.
    None,
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI chat completions API.
    OpenAI,
}

/// Unit of text that receives one summary, one record, and one index entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SummaryGranularity {
    /// Every extracted segment is summarized and stored on its own.
    #[default]
    Segment,
    /// Segments of a file are concatenated and summarized once.
    File,
}

/// Values supplied on the command line that take precedence over the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Overrides `FOLDER_PATH`.
    pub folder_path: Option<PathBuf>,
    /// Overrides `VECTOR_DB_PATH`.
    pub vector_db_path: Option<PathBuf>,
    /// Overrides `RECORD_DB_PATH`.
    pub record_db_path: Option<PathBuf>,
    /// Overrides `QUERY`.
    pub query: Option<String>,
    /// Overrides `SEARCH_TOP_K`.
    pub search_top_k: Option<usize>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env(overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok(), overrides)
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// Blank values are treated as unset. Overrides win over looked-up values.
    pub fn from_lookup<F>(lookup: F, overrides: ConfigOverrides) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required_path = |key: &str, value: Option<PathBuf>| {
            value
                .or_else(|| optional(key).map(PathBuf::from))
                .ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
        };

        Ok(Self {
            folder_path: required_path("FOLDER_PATH", overrides.folder_path)?,
            vector_db_path: required_path("VECTOR_DB_PATH", overrides.vector_db_path)?,
            record_db_path: overrides
                .record_db_path
                .or_else(|| optional("RECORD_DB_PATH").map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RECORD_DB_PATH)),
            collection_name: optional("VECTOR_COLLECTION_NAME")
                .unwrap_or_else(|| DEFAULT_COLLECTION_NAME.to_string()),
            query: overrides.query.or_else(|| optional("QUERY")),
            embedding_provider: parse_or(
                "EMBEDDING_PROVIDER",
                optional("EMBEDDING_PROVIDER"),
                EmbeddingProvider::OpenAI,
            )?,
            embedding_model: optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_dimension: parse_or(
                "EMBEDDING_DIMENSION",
                optional("EMBEDDING_DIMENSION"),
                DEFAULT_EMBEDDING_DIMENSION,
            )?,
            llm_provider: parse_or(
                "LLM_PROVIDER",
                optional("LLM_PROVIDER"),
                LlmProvider::OpenAI,
            )?,
            summarization_model: optional("SUMMARIZATION_MODEL")
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            summarization_max_words: parse_or(
                "SUMMARIZATION_MAX_WORDS",
                optional("SUMMARIZATION_MAX_WORDS"),
                DEFAULT_SUMMARIZATION_MAX_WORDS,
            )?,
            generation_model: optional("GENERATION_MODEL")
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            generation_max_tokens: parse_or(
                "GENERATION_MAX_TOKENS",
                optional("GENERATION_MAX_TOKENS"),
                DEFAULT_GENERATION_MAX_TOKENS,
            )?,
            summary_granularity: parse_or(
                "SUMMARY_GRANULARITY",
                optional("SUMMARY_GRANULARITY"),
                SummaryGranularity::Segment,
            )?,
            search_top_k: match overrides.search_top_k {
                Some(value) => value,
                None => parse_or("SEARCH_TOP_K", optional("SEARCH_TOP_K"), DEFAULT_TOP_K)?,
            },
            text_splitter_chunk_size: parse_optional(
                "TEXT_SPLITTER_CHUNK_SIZE",
                optional("TEXT_SPLITTER_CHUNK_SIZE"),
            )?,
            text_splitter_chunk_overlap: parse_optional(
                "TEXT_SPLITTER_CHUNK_OVERLAP",
                optional("TEXT_SPLITTER_CHUNK_OVERLAP"),
            )?,
            text_splitter_use_safe_defaults: optional("TEXT_SPLITTER_USE_SAFE_DEFAULTS")
                .map(|value| parse_flag("TEXT_SPLITTER_USE_SAFE_DEFAULTS", &value))
                .transpose()?
                .unwrap_or(false),
            max_file_size: parse_or(
                "MAX_FILE_SIZE_BYTES",
                optional("MAX_FILE_SIZE_BYTES"),
                DEFAULT_MAX_FILE_SIZE,
            )?,
            openai_api_key: optional("OPENAI_API_KEY"),
            openai_base_url: optional("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            ollama_url: optional("OLLAMA_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            request_max_retries: parse_or(
                "REQUEST_MAX_RETRIES",
                optional("REQUEST_MAX_RETRIES"),
                DEFAULT_MAX_RETRIES,
            )?,
            request_timeout_secs: parse_or(
                "REQUEST_TIMEOUT_SECS",
                optional("REQUEST_TIMEOUT_SECS"),
                DEFAULT_TIMEOUT_SECS,
            )?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    Ok(parse_optional(key, value)?.unwrap_or(default))
}

fn parse_optional<T: std::str::FromStr>(
    key: &str,
    value: Option<String>,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue(key.to_string())),
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "local" => Ok(Self::Local),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for SummaryGranularity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "segment" => Ok(Self::Segment),
            "file" => Ok(Self::File),
            _ => Err(()),
        }
    }
}

/// Read the environment and apply command-line overrides.
///
/// Callers load `.env` beforehand so logging sees the same variables.
pub fn load_config(overrides: ConfigOverrides) -> Result<Config, ConfigError> {
    let config = Config::from_env(overrides)?;
    tracing::debug!(
        folder = %config.folder_path.display(),
        vector_db = %config.vector_db_path.display(),
        record_db = %config.record_db_path.display(),
        collection = %config.collection_name,
        embedding_provider = ?config.embedding_provider,
        llm_provider = ?config.llm_provider,
        granularity = ?config.summary_granularity,
        "Loaded configuration"
    );
    Ok(config)
}
