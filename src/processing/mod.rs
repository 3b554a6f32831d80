//! Document processing pipeline: ingestion into both stores and retrieval over them.

mod ingest;
mod retrieval;
mod service;
mod summarize;
pub mod types;

pub use ingest::IngestionPipeline;
pub use retrieval::{DEFAULT_TOP_K, RetrievalService, RetrievedContext};
pub use service::{Collaborators, DocumentService};
pub use summarize::Summarizer;
pub use types::{
    CollaboratorError, FailureStage, FileAssignment, IngestError, IngestFailure, IngestReport,
    RetrievalError,
};
