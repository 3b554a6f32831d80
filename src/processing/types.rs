//! Reports and error definitions for ingestion and retrieval.

use crate::{
    embedding::EmbeddingClientError, extract::ExtractionError, index::SummaryIndexError,
    llm::LlmClientError, records::RecordStoreError,
};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal ingestion errors. Per-file problems are reported in [`IngestReport::failures`] instead.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Record store could not be opened or closed.
    #[error("Record store failure: {0}")]
    Records(#[from] RecordStoreError),
    /// Summary index could not be opened.
    #[error("Summary index failure: {0}")]
    Index(#[from] SummaryIndexError),
    /// Source folder could not be listed.
    #[error("Failed to list {}: {message}", path.display())]
    Listing {
        /// Folder being listed.
        path: PathBuf,
        /// Underlying failure.
        message: String,
    },
}

/// Errors surfaced while answering a query. Every failure on this path is fatal.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Record store could not be opened or read.
    #[error("Record store failure: {0}")]
    Records(#[from] RecordStoreError),
    /// Summary index could not be opened or queried.
    #[error("Summary index failure: {0}")]
    Index(#[from] SummaryIndexError),
    /// Answer generation failed.
    #[error("Answer generation failed: {0}")]
    Generation(#[from] LlmClientError),
}

/// Failure to construct the shared collaborators from configuration.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// Embedding client could not be built.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// Generation client could not be built.
    #[error(transparent)]
    Completion(#[from] LlmClientError),
    /// Extractor could not be built.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// Pipeline step at which a unit failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// Turning the file into segments.
    Extraction,
    /// Producing the summary text.
    Summarization,
    /// Writing the record store row.
    RecordWrite,
    /// Appending to the summary index.
    IndexAdd,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Extraction => "extraction",
            Self::Summarization => "summarization",
            Self::RecordWrite => "record_write",
            Self::IndexAdd => "index_add",
        };
        f.write_str(label)
    }
}

/// Id assigned to one folder entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAssignment {
    /// 1-based id in listing order.
    pub doc_id: u64,
    /// Entry name.
    pub filename: String,
}

/// A logged, non-fatal failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestFailure {
    /// Document the failure belongs to.
    pub doc_id: u64,
    /// Entry name.
    pub filename: String,
    /// Segment index, when the failure is tied to one unit.
    pub segment: Option<u32>,
    /// Step that failed.
    pub stage: FailureStage,
    /// Rendered error.
    pub message: String,
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Every listed entry with its id, in listing order.
    pub assignments: Vec<FileAssignment>,
    /// Segments produced by the extractor across all files.
    pub segments_seen: usize,
    /// Successful record store writes.
    pub records_written: usize,
    /// Successful summary index appends.
    pub summaries_added: usize,
    /// Non-fatal failures, in the order they happened.
    pub failures: Vec<IngestFailure>,
}

impl IngestReport {
    /// Whether every unit was stored without failures.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failures recorded for `doc_id`.
    pub fn failures_for(&self, doc_id: u64) -> impl Iterator<Item = &IngestFailure> {
        self.failures
            .iter()
            .filter(move |failure| failure.doc_id == doc_id)
    }

    pub(crate) fn record_failure(
        &mut self,
        doc_id: u64,
        filename: &str,
        segment: Option<u32>,
        stage: FailureStage,
        message: impl fmt::Display,
    ) {
        let message = message.to_string();
        tracing::error!(
            doc_id,
            filename,
            segment = ?segment,
            stage = %stage,
            error = %message,
            "Failed to ingest unit"
        );
        self.failures.push(IngestFailure {
            doc_id,
            filename: filename.to_string(),
            segment,
            stage,
            message,
        });
    }
}
