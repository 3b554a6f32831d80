use crate::extract::Segment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identity of one stored unit: the file id plus the segment index within that file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    /// 1-based id assigned to the file during ingestion.
    pub doc_id: u64,
    /// 0-based segment index; always 0 for per-file records.
    pub segment: u32,
}

impl RecordKey {
    /// Key for segment `segment` of document `doc_id`.
    pub const fn new(doc_id: u64, segment: u32) -> Self {
        Self { doc_id, segment }
    }

    /// Key for a whole-file record.
    pub const fn file(doc_id: u64) -> Self {
        Self::new(doc_id, 0)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "document {} segment {}", self.doc_id, self.segment)
    }
}

/// Descriptive metadata persisted for each record, serialized as JSON text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Base name of the source file.
    pub filename: String,
    /// Path the file was read from.
    pub source: String,
    /// 1-based page number, or 0 when unknown.
    pub pagenumber: u32,
    /// Number of entries in `images`.
    pub image_count: usize,
    /// Positional index to image path.
    #[serde(default)]
    pub images: BTreeMap<usize, String>,
}

impl DocumentMetadata {
    /// Metadata describing one extracted segment of `filename`.
    pub fn for_segment(
        filename: impl Into<String>,
        source: impl Into<String>,
        segment: &Segment,
    ) -> Self {
        let images: BTreeMap<usize, String> = segment
            .images
            .iter()
            .enumerate()
            .map(|(index, image)| (index, image.path.clone()))
            .collect();
        Self {
            filename: filename.into(),
            source: source.into(),
            pagenumber: segment.page_number.unwrap_or(0),
            image_count: images.len(),
            images,
        }
    }

    /// Fold another unit of the same file into this one.
    ///
    /// Keeps the first known page number and appends images, renumbering them after the ones
    /// already present.
    pub fn merge(&mut self, other: DocumentMetadata) {
        if self.pagenumber == 0 {
            self.pagenumber = other.pagenumber;
        }
        let offset = self.images.len();
        self.images.extend(
            other
                .images
                .into_values()
                .enumerate()
                .map(|(index, path)| (offset + index, path)),
        );
        self.image_count = self.images.len();
    }
}
