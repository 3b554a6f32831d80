//! Folder ingestion: list, extract, summarize, then write records and summaries.

use crate::{
    config::SummaryGranularity,
    extract::{Extractor, Segments},
    index::SummaryIndex,
    processing::{
        summarize::Summarizer,
        types::{FailureStage, FileAssignment, IngestError, IngestReport},
    },
    records::{DocumentMetadata, RecordKey, RecordLookup},
};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One unit ready to be summarized and stored.
struct Unit {
    key: RecordKey,
    metadata: DocumentMetadata,
    text: String,
}

/// Runs one ingestion pass over a folder.
pub struct IngestionPipeline<'a> {
    extractor: &'a dyn Extractor,
    summarizer: &'a Summarizer,
    granularity: SummaryGranularity,
}

impl<'a> IngestionPipeline<'a> {
    /// Build a pipeline over borrowed collaborators.
    pub fn new(
        extractor: &'a dyn Extractor,
        summarizer: &'a Summarizer,
        granularity: SummaryGranularity,
    ) -> Self {
        Self {
            extractor,
            summarizer,
            granularity,
        }
    }

    /// Ingest every direct entry of `folder`.
    ///
    /// Only a failed listing aborts the run; everything else is logged and collected in the
    /// returned report.
    pub async fn run(
        &self,
        folder: &Path,
        records: &dyn RecordLookup,
        index: &mut SummaryIndex,
    ) -> Result<IngestReport, IngestError> {
        let entries = list_entries(folder)?;
        tracing::info!(folder = %folder.display(), entries = entries.len(), "Starting ingestion");

        let mut report = IngestReport {
            assignments: entries
                .iter()
                .zip(1u64..)
                .map(|(path, doc_id)| FileAssignment {
                    doc_id,
                    filename: display_name(path),
                })
                .collect(),
            ..IngestReport::default()
        };

        for (path, doc_id) in entries.iter().zip(1u64..) {
            let filename = display_name(path);
            let source = path.display().to_string();

            let segments = match self.extractor.extract(path).await {
                Ok(segments) => segments,
                Err(error) => {
                    report.record_failure(doc_id, &filename, None, FailureStage::Extraction, error);
                    continue;
                }
            };

            let units = match self.granularity {
                SummaryGranularity::Segment => {
                    segment_units(doc_id, &filename, &source, segments, &mut report)
                }
                SummaryGranularity::File => {
                    file_unit(doc_id, &filename, &source, segments, &mut report)
                        .into_iter()
                        .collect()
                }
            };

            for unit in units {
                self.store_unit(unit, &filename, records, index, &mut report)
                    .await;
            }
        }

        tracing::info!(
            files = report.assignments.len(),
            segments = report.segments_seen,
            records = report.records_written,
            summaries = report.summaries_added,
            failures = report.failures.len(),
            "Ingestion finished"
        );
        Ok(report)
    }

    async fn store_unit(
        &self,
        unit: Unit,
        filename: &str,
        records: &dyn RecordLookup,
        index: &mut SummaryIndex,
        report: &mut IngestReport,
    ) {
        let Unit {
            key,
            metadata,
            text,
        } = unit;

        let summary = match self.summarizer.summarize(&text).await {
            Ok(summary) => summary,
            Err(error) => {
                report.record_failure(
                    key.doc_id,
                    filename,
                    Some(key.segment),
                    FailureStage::Summarization,
                    error,
                );
                return;
            }
        };

        match records.put(key, &metadata) {
            Ok(()) => report.records_written += 1,
            Err(error) => report.record_failure(
                key.doc_id,
                filename,
                Some(key.segment),
                FailureStage::RecordWrite,
                error,
            ),
        }

        match index.add(key.doc_id, key.segment, &summary).await {
            Ok(_) => report.summaries_added += 1,
            Err(error) => report.record_failure(
                key.doc_id,
                filename,
                Some(key.segment),
                FailureStage::IndexAdd,
                error,
            ),
        }
    }
}

/// Direct children of `folder`, directories included, sorted by file name.
fn list_entries(folder: &Path) -> Result<Vec<PathBuf>, IngestError> {
    if !folder.is_dir() {
        return Err(IngestError::Listing {
            path: folder.to_path_buf(),
            message: "not a directory".into(),
        });
    }

    WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .map(|entry| {
            entry
                .map(walkdir::DirEntry::into_path)
                .map_err(|error| IngestError::Listing {
                    path: folder.to_path_buf(),
                    message: error.to_string(),
                })
        })
        .collect()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn segment_units(
    doc_id: u64,
    filename: &str,
    source: &str,
    segments: Segments,
    report: &mut IngestReport,
) -> Vec<Unit> {
    let mut units = Vec::new();
    for (index, segment) in segments.enumerate() {
        report.segments_seen += 1;
        let Ok(segment_index) = u32::try_from(index) else {
            report.record_failure(
                doc_id,
                filename,
                None,
                FailureStage::Extraction,
                "segment index exceeds u32 range",
            );
            break;
        };
        if segment.text.trim().is_empty() {
            tracing::debug!(doc_id, segment = segment_index, "Skipping blank segment");
            continue;
        }
        units.push(Unit {
            key: RecordKey::new(doc_id, segment_index),
            metadata: DocumentMetadata::for_segment(filename, source, &segment),
            text: segment.text,
        });
    }
    units
}

/// Collapse every segment of a file into a single unit keyed `(doc_id, 0)`.
fn file_unit(
    doc_id: u64,
    filename: &str,
    source: &str,
    segments: Segments,
    report: &mut IngestReport,
) -> Option<Unit> {
    let mut metadata: Option<DocumentMetadata> = None;
    let mut parts: Vec<String> = Vec::new();

    for segment in segments {
        report.segments_seen += 1;
        if segment.text.trim().is_empty() {
            continue;
        }
        let segment_metadata = DocumentMetadata::for_segment(filename, source, &segment);
        match metadata.as_mut() {
            Some(merged) => merged.merge(segment_metadata),
            None => metadata = Some(segment_metadata),
        }
        parts.push(segment.text);
    }

    let Some(metadata) = metadata else {
        tracing::debug!(doc_id, filename, "Skipping file without text");
        return None;
    };
    Some(Unit {
        key: RecordKey::file(doc_id),
        metadata,
        text: parts.join("\n\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingClient, EmbeddingClientError, LocalHashClient};
    use crate::extract::{ExtractionError, ImageRef, Segment};
    use crate::llm::{CompletionClient, CompletionRequest, LlmClientError};
    use crate::records::{RecordStore, RecordStoreError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Serves canned segments by file name; names without an entry fail to extract.
    struct CannedExtractor {
        files: HashMap<String, Vec<Segment>>,
    }

    #[async_trait]
    impl Extractor for CannedExtractor {
        async fn extract(&self, path: &Path) -> Result<Segments, ExtractionError> {
            self.files
                .get(&display_name(path))
                .cloned()
                .map(Segments::new)
                .ok_or_else(|| ExtractionError::Unsupported("no canned content".into()))
        }
    }

    fn seg(text: &str, page: Option<u32>, images: &[&str]) -> Segment {
        Segment {
            text: text.into(),
            page_number: page,
            images: images
                .iter()
                .map(|path| ImageRef {
                    path: (*path).to_string(),
                })
                .collect(),
        }
    }

    /// Fails every prompt that mentions `FAIL`.
    struct PickyClient;

    #[async_trait]
    impl CompletionClient for PickyClient {
        async fn complete(&self, request: CompletionRequest) -> Result<String, LlmClientError> {
            if request.prompt.contains("FAIL") {
                return Err(LlmClientError::GenerationFailed("model refused".into()));
            }
            Ok("A short summary.".into())
        }
    }

    /// Record store whose writes always fail.
    struct ReadOnlyRecords;

    impl RecordLookup for ReadOnlyRecords {
        fn get(&self, key: RecordKey) -> Result<DocumentMetadata, RecordStoreError> {
            Err(RecordStoreError::NotFound(key))
        }

        fn put(&self, _key: RecordKey, _metadata: &DocumentMetadata) -> Result<(), RecordStoreError> {
            Err(RecordStoreError::StorageUnavailable("disk is read-only".into()))
        }
    }

    struct DownEmbedder;

    #[async_trait]
    impl EmbeddingClient for DownEmbedder {
        async fn generate_embeddings(
            &self,
            _texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            Err(EmbeddingClientError::ProviderUnavailable("connection refused".into()))
        }

        fn model_label(&self) -> String {
            "test/down".into()
        }
    }

    async fn fixture(
        files: &[(&str, Vec<Segment>)],
    ) -> (tempfile::TempDir, CannedExtractor, RecordStore, SummaryIndex) {
        fixture_with(files, Arc::new(LocalHashClient::new(16))).await
    }

    async fn fixture_with(
        files: &[(&str, Vec<Segment>)],
        embedder: Arc<dyn EmbeddingClient>,
    ) -> (tempfile::TempDir, CannedExtractor, RecordStore, SummaryIndex) {
        let dir = tempfile::tempdir().expect("tempdir");
        let docs = dir.path().join("docs");
        std::fs::create_dir_all(&docs).expect("docs dir");
        for (name, _) in files {
            std::fs::write(docs.join(name), "x").expect("write");
        }
        let extractor = CannedExtractor {
            files: files
                .iter()
                .map(|(name, segments)| ((*name).to_string(), segments.clone()))
                .collect(),
        };
        let records = RecordStore::open_in_memory().expect("records");
        let index = SummaryIndex::open(dir.path().join("vectors"), "summary_vectors", embedder)
            .await
            .expect("index");
        (dir, extractor, records, index)
    }

    #[tokio::test]
    async fn segments_get_their_own_keys() {
        let (dir, extractor, records, mut index) = fixture(&[(
            "report.pdf",
            vec![
                seg("First page text.", Some(1), &["fig.png"]),
                seg("   ", Some(1), &[]),
                seg("Second page text.", Some(2), &[]),
            ],
        )])
        .await;
        let summarizer = Summarizer::extractive(20);
        let pipeline = IngestionPipeline::new(&extractor, &summarizer, SummaryGranularity::Segment);

        let report = pipeline
            .run(&dir.path().join("docs"), &records, &mut index)
            .await
            .expect("run");

        assert!(report.is_clean());
        assert_eq!(report.segments_seen, 3);
        assert_eq!(report.records_written, 2);
        assert_eq!(records.segments_for(1).expect("segments"), vec![0, 2]);
        let first = records.get(RecordKey::new(1, 0)).expect("first");
        assert_eq!(first.pagenumber, 1);
        assert_eq!(first.image_count, 1);
        let keys: Vec<RecordKey> = index.entries().iter().map(|entry| entry.key()).collect();
        assert_eq!(keys, vec![RecordKey::new(1, 0), RecordKey::new(1, 2)]);
    }

    #[tokio::test]
    async fn file_granularity_merges_segments() {
        let (dir, extractor, records, mut index) = fixture(&[(
            "manual.pdf",
            vec![
                seg("Intro.", None, &["a.png"]),
                seg("Body.", Some(4), &["b.png"]),
            ],
        )])
        .await;
        let summarizer = Summarizer::extractive(20);
        let pipeline = IngestionPipeline::new(&extractor, &summarizer, SummaryGranularity::File);

        let report = pipeline
            .run(&dir.path().join("docs"), &records, &mut index)
            .await
            .expect("run");

        assert_eq!(report.records_written, 1);
        assert_eq!(index.len(), 1);
        assert_eq!(index.entries()[0].summary_text, "Intro. Body.");
        let metadata = records.get(RecordKey::file(1)).expect("record");
        assert_eq!(metadata.pagenumber, 4);
        assert_eq!(metadata.image_count, 2);
        assert_eq!(metadata.images.get(&1).map(String::as_str), Some("b.png"));
    }

    #[tokio::test]
    async fn ids_follow_sorted_listing_and_failures_do_not_stop_the_run() {
        let (dir, extractor, records, mut index) = fixture(&[
            ("b.txt", vec![seg("Bravo.", None, &[])]),
            ("a.txt", vec![seg("Alpha.", None, &[])]),
        ])
        .await;
        std::fs::write(dir.path().join("docs").join("c.bin"), "x").expect("write");
        let summarizer = Summarizer::extractive(20);
        let pipeline = IngestionPipeline::new(&extractor, &summarizer, SummaryGranularity::Segment);

        let report = pipeline
            .run(&dir.path().join("docs"), &records, &mut index)
            .await
            .expect("run");

        let names: Vec<(u64, &str)> = report
            .assignments
            .iter()
            .map(|a| (a.doc_id, a.filename.as_str()))
            .collect();
        assert_eq!(names, vec![(1, "a.txt"), (2, "b.txt"), (3, "c.bin")]);
        assert_eq!(records.get(RecordKey::file(1)).expect("a").filename, "a.txt");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].doc_id, 3);
        assert_eq!(report.failures[0].stage, FailureStage::Extraction);
        assert_eq!(records.count().expect("count"), 2);
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn missing_folder_is_fatal() {
        let (dir, extractor, records, mut index) = fixture(&[]).await;
        let summarizer = Summarizer::extractive(20);
        let pipeline = IngestionPipeline::new(&extractor, &summarizer, SummaryGranularity::Segment);

        let error = pipeline
            .run(&dir.path().join("absent"), &records, &mut index)
            .await
            .unwrap_err();
        assert!(matches!(error, IngestError::Listing { .. }));
    }

    #[tokio::test]
    async fn summarization_failure_skips_only_that_segment() {
        let (dir, extractor, records, mut index) = fixture(&[(
            "notes.txt",
            vec![
                seg("Alpha section.", None, &[]),
                seg("FAIL on this section.", None, &[]),
                seg("Gamma section.", None, &[]),
            ],
        )])
        .await;
        let client: Arc<dyn CompletionClient> = Arc::new(PickyClient);
        let summarizer = Summarizer::new(Some(client), "test-model", 20);
        let pipeline = IngestionPipeline::new(&extractor, &summarizer, SummaryGranularity::Segment);

        let report = pipeline
            .run(&dir.path().join("docs"), &records, &mut index)
            .await
            .expect("run");

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, FailureStage::Summarization);
        assert_eq!(report.failures[0].segment, Some(1));
        assert_eq!(records.segments_for(1).expect("segments"), vec![0, 2]);
        let keys: Vec<RecordKey> = index.entries().iter().map(|entry| entry.key()).collect();
        assert_eq!(keys, vec![RecordKey::new(1, 0), RecordKey::new(1, 2)]);
    }

    #[tokio::test]
    async fn record_write_failure_still_adds_the_summary() {
        let (dir, extractor, _records, mut index) =
            fixture(&[("a.txt", vec![seg("Alpha.", None, &[])])]).await;
        let summarizer = Summarizer::extractive(20);
        let pipeline = IngestionPipeline::new(&extractor, &summarizer, SummaryGranularity::Segment);

        let report = pipeline
            .run(&dir.path().join("docs"), &ReadOnlyRecords, &mut index)
            .await
            .expect("run");

        assert_eq!(report.records_written, 0);
        assert_eq!(report.summaries_added, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, FailureStage::RecordWrite);
        assert_eq!(index.len(), 1);
        assert_eq!(index.entries()[0].key(), RecordKey::file(1));
    }

    #[tokio::test]
    async fn index_failure_still_writes_the_record() {
        let (dir, extractor, records, mut index) = fixture_with(
            &[("a.txt", vec![seg("Alpha.", None, &[])])],
            Arc::new(DownEmbedder),
        )
        .await;
        let summarizer = Summarizer::extractive(20);
        let pipeline = IngestionPipeline::new(&extractor, &summarizer, SummaryGranularity::Segment);

        let report = pipeline
            .run(&dir.path().join("docs"), &records, &mut index)
            .await
            .expect("run");

        assert_eq!(report.records_written, 1);
        assert_eq!(report.summaries_added, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, FailureStage::IndexAdd);
        assert_eq!(records.get(RecordKey::file(1)).expect("record").filename, "a.txt");
        assert!(index.is_empty());
    }
}
