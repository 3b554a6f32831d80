use crate::records::RecordKey;
use serde::{Deserialize, Serialize};

/// One indexed summary. Entries are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    /// Random UUID v4.
    pub id: String,
    /// Document id of the summarized unit.
    pub doc_id: u64,
    /// Segment index of the summarized unit.
    pub segment: u32,
    /// Summary text.
    pub summary_text: String,
    /// Hex SHA-256 of `summary_text`.
    pub summary_hash: String,
    /// Embedding of `summary_text`.
    pub embedding: Vec<f32>,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl SummaryEntry {
    /// Record key this entry summarizes.
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.doc_id, self.segment)
    }
}

/// A ranked query result.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryHit {
    /// Id of the matching entry.
    pub id: String,
    /// Record key the entry points at.
    pub key: RecordKey,
    /// Stored summary text.
    pub summary_text: String,
    /// Cosine similarity to the query.
    pub score: f32,
}

/// `collection.json` contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CollectionManifest {
    pub(crate) name: String,
    /// Fixed by the first added entry.
    #[serde(default)]
    pub(crate) dimension: Option<usize>,
    pub(crate) model: String,
    pub(crate) created_at: String,
}
