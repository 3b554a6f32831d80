//! Persistent vector index over document summaries.
//!
//! A collection lives in `<dir>/<name>/`. Every [`SummaryIndex::add`] embeds the summary and
//! appends one line to `entries.jsonl`; entries are never rewritten, so adding the same summary
//! twice stores it twice. Queries embed the question and rank every entry by cosine similarity.

mod collection;
mod payload;
mod types;

pub use payload::compute_summary_hash;
pub use types::{SummaryEntry, SummaryHit};

use crate::embedding::{EmbeddingClient, EmbeddingClientError};
use collection::CollectionFiles;
use payload::{cosine_similarity, current_timestamp_rfc3339, generate_entry_id};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use types::CollectionManifest;

/// Failures raised by the summary index.
#[derive(Debug, Error)]
pub enum SummaryIndexError {
    /// Index directory could not be opened or created.
    #[error("summary index unavailable: {0}")]
    Unavailable(String),
    /// Embedding the summary or query failed.
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Provider returned no vector or an empty vector.
    #[error("embedding provider returned an empty vector")]
    EmptyEmbedding,
    /// Vector size differs from the collection's.
    #[error("embedding dimension mismatch: collection uses {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension recorded in the manifest.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },
    /// Appending to the collection failed.
    #[error("failed to write summary index: {0}")]
    IndexWrite(#[source] std::io::Error),
    /// Persisted collection files could not be parsed.
    #[error("summary index is corrupt: {0}")]
    Corrupt(String),
}

/// Handle on one opened collection.
pub struct SummaryIndex {
    files: CollectionFiles,
    manifest: CollectionManifest,
    entries: Vec<SummaryEntry>,
    embedder: Arc<dyn EmbeddingClient>,
}

impl std::fmt::Debug for SummaryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummaryIndex")
            .field("dir", &self.files.dir())
            .field("dimension", &self.manifest.dimension)
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl SummaryIndex {
    /// Open the collection `name` under `dir`, creating it when absent.
    pub async fn open(
        dir: impl AsRef<Path>,
        name: &str,
        embedder: Arc<dyn EmbeddingClient>,
    ) -> Result<Self, SummaryIndexError> {
        let files = CollectionFiles::create(dir.as_ref(), name).await?;

        let manifest = match files.load_manifest().await? {
            Some(manifest) => {
                let label = embedder.model_label();
                if manifest.model != label {
                    tracing::warn!(
                        collection = name,
                        stored = %manifest.model,
                        current = %label,
                        "Collection was built with a different embedding model"
                    );
                }
                manifest
            }
            None => {
                let manifest = CollectionManifest {
                    name: name.to_string(),
                    dimension: None,
                    model: embedder.model_label(),
                    created_at: current_timestamp_rfc3339(),
                };
                files.save_manifest(&manifest).await?;
                tracing::info!(collection = name, path = %files.dir().display(), "Created summary collection");
                manifest
            }
        };

        let entries = files.load_entries().await?;
        tracing::debug!(
            collection = name,
            entries = entries.len(),
            dimension = ?manifest.dimension,
            "Summary index opened"
        );

        Ok(Self {
            files,
            manifest,
            entries,
            embedder,
        })
    }

    /// Embed `summary_text` and append it under `(doc_id, segment)`.
    pub async fn add(
        &mut self,
        doc_id: u64,
        segment: u32,
        summary_text: &str,
    ) -> Result<SummaryEntry, SummaryIndexError> {
        let embedding = self.embed_one(summary_text).await?;

        match self.manifest.dimension {
            Some(expected) if expected != embedding.len() => {
                return Err(SummaryIndexError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
            Some(_) => {}
            None => {
                self.manifest.dimension = Some(embedding.len());
                self.files.save_manifest(&self.manifest).await?;
            }
        }

        let entry = SummaryEntry {
            id: generate_entry_id(),
            doc_id,
            segment,
            summary_text: summary_text.to_string(),
            summary_hash: compute_summary_hash(summary_text),
            embedding,
            created_at: current_timestamp_rfc3339(),
        };
        self.files.append_entry(&entry).await?;
        self.entries.push(entry.clone());

        tracing::info!(doc_id, segment, entry_id = %entry.id, "Summary added to index");
        Ok(entry)
    }

    /// Return up to `k` entries ranked by similarity to `query_text`.
    ///
    /// An empty index or `k == 0` yields no hits without calling the embedder. Equal scores keep
    /// insertion order.
    pub async fn query(
        &self,
        query_text: &str,
        k: usize,
    ) -> Result<Vec<SummaryHit>, SummaryIndexError> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query = self.embed_one(query_text).await?;
        if let Some(expected) = self.manifest.dimension
            && expected != query.len()
        {
            return Err(SummaryIndexError::DimensionMismatch {
                expected,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(f32, &SummaryEntry)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(&query, &entry.embedding), entry))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, entry)| SummaryHit {
                id: entry.id.clone(),
                key: entry.key(),
                summary_text: entry.summary_text.clone(),
                score,
            })
            .collect())
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the collection holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[SummaryEntry] {
        &self.entries
    }

    /// Vector size fixed by the first entry, if any.
    pub fn dimension(&self) -> Option<usize> {
        self.manifest.dimension
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, SummaryIndexError> {
        let embedding = self
            .embedder
            .generate_embeddings(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or(SummaryIndexError::EmptyEmbedding)?;
        if embedding.is_empty() {
            return Err(SummaryIndexError::EmptyEmbedding);
        }
        Ok(embedding)
    }
}
