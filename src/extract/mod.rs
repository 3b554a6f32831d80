//! Turning source files into ordered text segments.
//!
//! An [`Extractor`] maps one path to a finite sequence of [`Segment`]s. The production
//! implementation is [`PartitionExtractor`], which reads PDFs page by page and everything else as
//! UTF-8 text (HTML reduced to its visible body text) before cutting the result down to the configured token budget.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

mod chunking;
mod html;
mod images;
mod partition;

pub use chunking::{ChunkingError, TextChunker};
pub use images::detect_images;
pub use partition::{DEFAULT_MAX_FILE_SIZE, PartitionExtractor};

/// Reference to an image embedded in a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Path or URL exactly as it appears in the source.
    pub path: String,
}

/// One extracted unit of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Segment body.
    pub text: String,
    /// 1-based page number when the source has pages.
    pub page_number: Option<u32>,
    /// Images referenced from this segment, in order of appearance.
    pub images: Vec<ImageRef>,
}

impl Segment {
    /// Build a segment without page information, detecting image references in `text`.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let images = detect_images(&text);
        Self {
            text,
            page_number: None,
            images,
        }
    }
}

/// Finite, single-pass sequence of segments for one file.
#[derive(Debug)]
pub struct Segments {
    inner: std::vec::IntoIter<Segment>,
}

impl Segments {
    /// Wrap an ordered list of segments.
    pub fn new(segments: Vec<Segment>) -> Self {
        Self {
            inner: segments.into_iter(),
        }
    }
}

impl Iterator for Segments {
    type Item = Segment;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Segments {}

/// Reasons a single file could not be turned into segments.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Path is a directory or other non-regular entry.
    #[error("not a regular file: {}", .0.display())]
    NotAFile(PathBuf),
    /// File exceeds the configured size cap.
    #[error("file too large: {size} bytes (limit {limit})")]
    FileTooLarge {
        /// Observed size in bytes.
        size: u64,
        /// Configured cap in bytes.
        limit: u64,
    },
    /// Content is neither UTF-8 text nor a PDF.
    #[error("unsupported format: {0}")]
    Unsupported(String),
    /// PDF parser rejected the file.
    #[error("PDF error: {0}")]
    Pdf(String),
    /// Filesystem failure while reading.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Segmenting the extracted text failed.
    #[error(transparent)]
    Chunking(#[from] ChunkingError),
}

/// Source of segments for a single file.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extract the ordered segments of the file at `path`.
    async fn extract(&self, path: &Path) -> Result<Segments, ExtractionError>;
}
