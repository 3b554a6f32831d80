//! Query answering over the summary index joined with the record store.

use crate::{
    index::{SummaryHit, SummaryIndex},
    llm::{CompletionClient, CompletionRequest, LlmClientError},
    processing::types::RetrievalError,
    records::{DocumentMetadata, RecordKey, RecordLookup, RecordStoreError},
};
use std::fmt::Write as _;
use std::sync::Arc;

/// Default number of summaries retrieved per query.
pub const DEFAULT_TOP_K: usize = 4;

const SYSTEM_PROMPT: &str = "You answer questions about a document collection. Use only the \
document summaries provided. Cite documents by id. If the summaries do not contain the answer, \
say so.";

/// A hit joined with its record.
#[derive(Debug, Clone)]
pub struct RetrievedContext {
    /// Record key of the hit.
    pub key: RecordKey,
    /// Stored metadata for the key.
    pub metadata: DocumentMetadata,
    /// Indexed summary text.
    pub summary: String,
    /// Similarity score.
    pub score: f32,
}

/// Answers questions from the indexed summaries.
#[derive(Clone)]
pub struct RetrievalService {
    completion: Option<Arc<dyn CompletionClient>>,
    model: String,
    max_tokens: usize,
    top_k: usize,
}

impl std::fmt::Debug for RetrievalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalService")
            .field("generative", &self.completion.is_some())
            .field("model", &self.model)
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}

impl RetrievalService {
    /// Build a service; `completion == None` answers with the retrieved context itself.
    pub fn new(
        completion: Option<Arc<dyn CompletionClient>>,
        model: impl Into<String>,
        max_tokens: usize,
        top_k: usize,
    ) -> Self {
        Self {
            completion,
            model: model.into(),
            max_tokens,
            top_k,
        }
    }

    /// Retrieve the best summaries for `query` and produce one answer string.
    pub async fn answer(
        &self,
        query: &str,
        records: &dyn RecordLookup,
        index: &SummaryIndex,
    ) -> Result<String, RetrievalError> {
        let hits = index.query(query, self.top_k).await?;
        let contexts = join_records(hits, records)?;
        tracing::info!(query, joined = contexts.len(), "Retrieved summaries");

        let Some(client) = self.completion.as_ref() else {
            return Ok(build_context_answer(query, &contexts));
        };

        let answer = client
            .complete(CompletionRequest {
                model: self.model.clone(),
                system: Some(SYSTEM_PROMPT.to_string()),
                prompt: build_answer_prompt(query, &contexts),
                max_tokens: Some(self.max_tokens),
                temperature: 0.0,
            })
            .await?;
        if answer.trim().is_empty() {
            return Err(LlmClientError::InvalidResponse(
                "provider returned an empty answer".into(),
            )
            .into());
        }
        Ok(answer)
    }
}

/// Fetch the record for each hit, dropping hits whose record is missing.
pub(crate) fn join_records(
    hits: Vec<SummaryHit>,
    records: &dyn RecordLookup,
) -> Result<Vec<RetrievedContext>, RecordStoreError> {
    let mut contexts = Vec::with_capacity(hits.len());
    for hit in hits {
        match records.get(hit.key) {
            Ok(metadata) => contexts.push(RetrievedContext {
                key: hit.key,
                metadata,
                summary: hit.summary_text,
                score: hit.score,
            }),
            Err(RecordStoreError::NotFound(key)) => {
                tracing::warn!(
                    doc_id = key.doc_id,
                    segment = key.segment,
                    "Skipping hit without a stored record"
                );
            }
            Err(error) => return Err(error),
        }
    }
    Ok(contexts)
}

fn page_label(metadata: &DocumentMetadata) -> String {
    if metadata.pagenumber == 0 {
        "unknown".to_string()
    } else {
        metadata.pagenumber.to_string()
    }
}

pub(crate) fn build_answer_prompt(query: &str, contexts: &[RetrievedContext]) -> String {
    let mut prompt = format!("Question: {}\n\nDocument summaries:\n", query.trim());
    if contexts.is_empty() {
        prompt.push_str("(no matching documents)\n");
    }
    for context in contexts {
        let _ = write!(
            prompt,
            "\nDocument id: {}\nSegment: {}\nFilename: {}\nSource: {}\nPage: {}\nImages: {}\nSummary: {}\n",
            context.key.doc_id,
            context.key.segment,
            context.metadata.filename,
            context.metadata.source,
            page_label(&context.metadata),
            context.metadata.image_count,
            context.summary.trim(),
        );
    }
    prompt.push_str("\nAnswer:");
    prompt
}

/// Deterministic answer listing the retrieved summaries in rank order.
pub(crate) fn build_context_answer(query: &str, contexts: &[RetrievedContext]) -> String {
    if contexts.is_empty() {
        return format!("No indexed documents matched \"{}\".", query.trim());
    }

    let mut answer = format!("Top matches for \"{}\":", query.trim());
    for (rank, context) in contexts.iter().enumerate() {
        let _ = write!(
            answer,
            "\n{}. Document {} ({}, page {}, {} images, score {:.3}): {}",
            rank + 1,
            context.key.doc_id,
            context.metadata.filename,
            page_label(&context.metadata),
            context.metadata.image_count,
            context.score,
            context.summary.trim(),
        );
    }
    answer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::LocalHashClient;
    use crate::records::RecordStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct EchoClient {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionClient for EchoClient {
        async fn complete(&self, request: CompletionRequest) -> Result<String, LlmClientError> {
            self.prompts.lock().expect("lock").push(request.prompt);
            Ok("Document 1 greets the world.".into())
        }
    }

    fn metadata(filename: &str, page: u32) -> DocumentMetadata {
        DocumentMetadata {
            filename: filename.into(),
            source: format!("/docs/{filename}"),
            pagenumber: page,
            ..DocumentMetadata::default()
        }
    }

    async fn index_with(dir: &std::path::Path, entries: &[(u64, &str)]) -> SummaryIndex {
        let mut index =
            SummaryIndex::open(dir, "summary_vectors", Arc::new(LocalHashClient::new(64)))
                .await
                .expect("index");
        for (doc_id, summary) in entries {
            index.add(*doc_id, 0, summary).await.expect("add");
        }
        index
    }

    #[tokio::test]
    async fn context_answer_lists_joined_hits() {
        let dir = tempfile::tempdir().expect("tempdir");
        let index = index_with(dir.path(), &[(1, "hello world"), (2, "tax forms")]).await;
        let records = RecordStore::open_in_memory().expect("records");
        records.put(RecordKey::file(1), &metadata("a.txt", 0)).expect("put");
        records.put(RecordKey::file(2), &metadata("b.txt", 3)).expect("put");

        let service = RetrievalService::new(None, "unused", 64, 1);
        let answer = service
            .answer("hello world", &records, &index)
            .await
            .expect("answer");

        assert!(answer.contains("Document 1 (a.txt, page unknown, 0 images"));
        assert!(answer.contains("hello world"));
        assert!(!answer.contains("b.txt"));
    }

    #[tokio::test]
    async fn hits_without_records_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let index = index_with(dir.path(), &[(1, "hello world")]).await;
        let records = RecordStore::open_in_memory().expect("records");

        let service = RetrievalService::new(None, "unused", 64, DEFAULT_TOP_K);
        let answer = service
            .answer("What is the content of Document 1?", &records, &index)
            .await
            .expect("answer");

        assert!(answer.starts_with("No indexed documents matched"));
    }

    #[tokio::test]
    async fn generated_answer_sees_record_metadata() {
        let dir = tempfile::tempdir().expect("tempdir");
        let index = index_with(dir.path(), &[(1, "hello world")]).await;
        let records = RecordStore::open_in_memory().expect("records");
        records.put(RecordKey::file(1), &metadata("a.txt", 2)).expect("put");
        let client = Arc::new(EchoClient {
            prompts: Mutex::new(Vec::new()),
        });

        let service =
            RetrievalService::new(Some(client.clone()), "gpt-4o-mini", 128, DEFAULT_TOP_K);
        let answer = service
            .answer("What is the content of Document 1?", &records, &index)
            .await
            .expect("answer");

        assert_eq!(answer, "Document 1 greets the world.");
        let prompts = client.prompts.lock().expect("lock");
        assert!(prompts[0].contains("Document id: 1"));
        assert!(prompts[0].contains("Filename: a.txt"));
        assert!(prompts[0].contains("Page: 2"));
        assert!(prompts[0].contains("Summary: hello world"));
    }

    #[tokio::test]
    async fn empty_index_still_answers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let index = index_with(dir.path(), &[]).await;
        let records = RecordStore::open_in_memory().expect("records");

        let service = RetrievalService::new(None, "unused", 64, DEFAULT_TOP_K);
        let answer = service.answer("anything", &records, &index).await.expect("answer");
        assert!(!answer.is_empty());
    }
}
