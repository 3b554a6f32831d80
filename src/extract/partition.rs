use super::html::{is_html, parse_html};
use super::{ExtractionError, Extractor, ImageRef, Segment, Segments, TextChunker};
use crate::config::Config;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Default cap on the size of a single source file (50 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Extractor that reads PDFs page by page, HTML as visible body text, and everything else as
/// UTF-8 text.
#[derive(Debug, Clone)]
pub struct PartitionExtractor {
    chunker: TextChunker,
    max_file_size: u64,
}

impl PartitionExtractor {
    /// Build an extractor from a prepared chunker.
    pub fn new(chunker: TextChunker, max_file_size: u64) -> Self {
        Self {
            chunker,
            max_file_size,
        }
    }

    /// Build an extractor using the configured embedding model's token budget.
    pub fn from_config(config: &Config) -> Result<Self, ExtractionError> {
        Ok(Self::new(
            TextChunker::from_config(config)?,
            config.max_file_size,
        ))
    }

    fn segment_pages(&self, pages: Vec<Page>) -> Vec<Segment> {
        let mut segments = Vec::new();
        for page in pages {
            let mut page_images = page.images;
            for chunk in self.chunker.chunk(&page.text) {
                let mut segment = Segment {
                    page_number: page.number,
                    ..Segment::from_text(chunk)
                };
                // Page-level images have no text position; they go with the first segment.
                segment.images.append(&mut page_images);
                segments.push(segment);
            }
        }
        segments
    }
}

/// Text of one page before chunking.
struct Page {
    number: Option<u32>,
    text: String,
    images: Vec<ImageRef>,
}

impl Page {
    fn unnumbered(text: String) -> Self {
        Self {
            number: None,
            text,
            images: Vec::new(),
        }
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

async fn read_pdf_pages(path: PathBuf) -> Result<Vec<Page>, ExtractionError> {
    let pages = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_by_pages(&path).map_err(|e| ExtractionError::Pdf(e.to_string()))
    })
    .await
    .map_err(|e| ExtractionError::Pdf(format!("PDF worker failed: {e}")))??;

    Ok(pages
        .into_iter()
        .zip(1u32..)
        .map(|(text, number)| Page {
            number: Some(number),
            text,
            images: Vec::new(),
        })
        .collect())
}

async fn read_text(path: &Path) -> Result<String, ExtractionError> {
    let bytes = tokio::fs::read(path).await?;
    let text = String::from_utf8(bytes)
        .map_err(|_| ExtractionError::Unsupported("content is not valid UTF-8 text".into()))?;
    if text.contains('\0') {
        return Err(ExtractionError::Unsupported(
            "content looks binary (NUL bytes)".into(),
        ));
    }
    Ok(text)
}

#[async_trait]
impl Extractor for PartitionExtractor {
    async fn extract(&self, path: &Path) -> Result<Segments, ExtractionError> {
        let meta = tokio::fs::metadata(path).await?;
        if !meta.is_file() {
            return Err(ExtractionError::NotAFile(path.to_path_buf()));
        }
        if meta.len() > self.max_file_size {
            return Err(ExtractionError::FileTooLarge {
                size: meta.len(),
                limit: self.max_file_size,
            });
        }

        let pages = if is_pdf(path) {
            read_pdf_pages(path.to_path_buf()).await?
        } else if is_html(path) {
            let page = parse_html(&read_text(path).await?);
            vec![Page {
                number: None,
                text: page.text,
                images: page.images,
            }]
        } else {
            vec![Page::unnumbered(read_text(path).await?)]
        };

        let segments = self.segment_pages(pages);
        tracing::debug!(
            path = %path.display(),
            segments = segments.len(),
            "Extracted segments"
        );
        Ok(Segments::new(segments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor(chunk_size: usize) -> PartitionExtractor {
        PartitionExtractor::new(
            TextChunker::whitespace(chunk_size, 0).expect("chunker"),
            DEFAULT_MAX_FILE_SIZE,
        )
    }

    #[tokio::test]
    async fn text_file_becomes_ordered_segments() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("notes.md");
        std::fs::write(&file, "one two three four five").expect("write");

        let segments: Vec<Segment> = extractor(2).extract(&file).await.expect("segments").collect();

        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["one two", "three four", "five"]);
        assert!(segments.iter().all(|s| s.page_number.is_none()));
    }

    #[tokio::test]
    async fn short_file_is_one_segment() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "hello world").expect("write");

        let segments: Vec<Segment> = extractor(64).extract(&file).await.expect("segments").collect();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "hello world");
    }

    #[tokio::test]
    async fn images_are_attached_to_their_segment() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("page.html");
        std::fs::write(&file, r#"<p>Chart</p><img src="chart.png">"#).expect("write");

        let segments: Vec<Segment> = extractor(64).extract(&file).await.expect("segments").collect();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].images.len(), 1);
        assert_eq!(segments[0].images[0].path, "chart.png");
    }

    #[tokio::test]
    async fn html_segments_carry_visible_text_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("report.htm");
        std::fs::write(
            &file,
            r#"<html><head><style>p{color:red}</style><script>var x=1;</script></head>
            <body><p>Quarterly revenue grew.</p><img src="growth.png"><p>Costs fell.</p></body></html>"#,
        )
        .expect("write");

        let segments: Vec<Segment> = extractor(3).extract(&file).await.expect("segments").collect();

        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Quarterly revenue grew.", "Costs fell."]);
        assert!(texts.iter().all(|text| !text.contains('<') && !text.contains("color")));
        assert_eq!(segments[0].images, vec![ImageRef { path: "growth.png".into() }]);
        assert!(segments[1].images.is_empty());
    }

    #[tokio::test]
    async fn whitespace_file_has_no_segments() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("blank.txt");
        std::fs::write(&file, "  \n\n\t").expect("write");

        let segments = extractor(8).extract(&file).await.expect("segments");
        assert_eq!(segments.count(), 0);
    }

    #[tokio::test]
    async fn directory_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let error = extractor(8).extract(dir.path()).await.unwrap_err();
        assert!(matches!(error, ExtractionError::NotAFile(_)));
    }

    #[tokio::test]
    async fn oversized_file_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("big.txt");
        std::fs::write(&file, "0123456789").expect("write");

        let extractor = PartitionExtractor::new(TextChunker::whitespace(8, 0).expect("chunker"), 4);
        let error = extractor.extract(&file).await.unwrap_err();
        assert!(matches!(
            error,
            ExtractionError::FileTooLarge { size: 10, limit: 4 }
        ));
    }

    #[tokio::test]
    async fn binary_content_is_unsupported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("image.bin");
        std::fs::write(&file, [0xff_u8, 0xfe, 0x00, 0x9f]).expect("write");

        let error = extractor(8).extract(&file).await.unwrap_err();
        assert!(matches!(error, ExtractionError::Unsupported(_)));
    }

    #[tokio::test]
    async fn malformed_pdf_reports_pdf_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("broken.PDF");
        std::fs::write(&file, "definitely not a pdf").expect("write");

        let error = extractor(8).extract(&file).await.unwrap_err();
        assert!(matches!(error, ExtractionError::Pdf(_)));
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let error = extractor(8)
            .extract(&dir.path().join("missing.txt"))
            .await
            .unwrap_err();
        assert!(matches!(error, ExtractionError::Io(_)));
    }
}
