//! Document service coordinating ingestion runs and queries over both stores.

use crate::{
    config::Config,
    embedding::{EmbeddingClient, build_embedding_client},
    extract::{Extractor, PartitionExtractor},
    index::SummaryIndex,
    llm::{CompletionClient, build_completion_client},
    processing::{
        ingest::IngestionPipeline,
        retrieval::RetrievalService,
        summarize::Summarizer,
        types::{CollaboratorError, IngestError, IngestReport, RetrievalError},
    },
    records::RecordStore,
};
use std::sync::Arc;

/// Long-lived clients shared by every run.
///
/// Built once near process start and handed to [`DocumentService`]; nothing in the pipeline
/// constructs its own provider clients.
#[derive(Clone)]
pub struct Collaborators {
    /// Embeds summaries and queries.
    pub embedder: Arc<dyn EmbeddingClient>,
    /// Generates summaries and answers; `None` selects extractive output.
    pub completion: Option<Arc<dyn CompletionClient>>,
    /// Turns files into segments.
    pub extractor: Arc<dyn Extractor>,
}

impl Collaborators {
    /// Build the providers selected in `config`.
    pub fn from_config(config: &Config) -> Result<Self, CollaboratorError> {
        tracing::info!(
            provider = ?config.embedding_provider,
            model = %config.embedding_model,
            "Initializing embedding client"
        );
        let embedder = build_embedding_client(config)?;
        let completion = build_completion_client(config)?;
        let extractor = Arc::new(PartitionExtractor::from_config(config)?);
        Ok(Self {
            embedder,
            completion,
            extractor,
        })
    }
}

/// Owns configuration and collaborators; opens the stores per operation.
pub struct DocumentService {
    config: Config,
    collaborators: Collaborators,
}

impl DocumentService {
    /// Assemble a service from prepared collaborators.
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
        }
    }

    /// Build collaborators from `config` and assemble the service.
    pub fn from_config(config: Config) -> Result<Self, CollaboratorError> {
        let collaborators = Collaborators::from_config(&config)?;
        Ok(Self::new(config, collaborators))
    }

    async fn open_index(&self) -> Result<SummaryIndex, crate::index::SummaryIndexError> {
        SummaryIndex::open(
            &self.config.vector_db_path,
            &self.config.collection_name,
            self.collaborators.embedder.clone(),
        )
        .await
    }

    /// Ingest every entry of the configured folder.
    ///
    /// The record store is closed explicitly on success and released on drop otherwise.
    pub async fn process_documents(&self) -> Result<IngestReport, IngestError> {
        let records = RecordStore::open(&self.config.record_db_path)?;
        let mut index = self.open_index().await?;
        let summarizer = Summarizer::new(
            self.collaborators.completion.clone(),
            self.config.summarization_model.clone(),
            self.config.summarization_max_words,
        );
        let pipeline = IngestionPipeline::new(
            self.collaborators.extractor.as_ref(),
            &summarizer,
            self.config.summary_granularity,
        );

        let report = pipeline
            .run(&self.config.folder_path, &records, &mut index)
            .await?;
        records.close()?;
        Ok(report)
    }

    /// Answer `query` using the configured `top_k`.
    pub async fn run_retrieval(&self, query: &str) -> Result<String, RetrievalError> {
        let records = RecordStore::open(&self.config.record_db_path)?;
        let index = self.open_index().await?;
        let service = RetrievalService::new(
            self.collaborators.completion.clone(),
            self.config.generation_model.clone(),
            self.config.generation_max_tokens,
            self.config.search_top_k,
        );

        let answer = service.answer(query, &records, &index).await?;
        records.close()?;
        tracing::info!(query, answer = %answer, "Query answered");
        Ok(answer)
    }
}
