#![deny(missing_docs)]

//! Core library for sumdex: summarize a folder of documents into a record store plus a vector
//! index of summaries, then answer questions over it.

/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// File-to-segment extraction and chunking.
pub mod extract;
/// Shared HTTP client and retry helpers.
pub mod http;
/// Persistent summary vector index.
pub mod index;
/// Text generation client abstraction and adapters.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion and retrieval pipeline.
pub mod processing;
/// SQLite record store.
pub mod records;
