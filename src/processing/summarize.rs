//! Segment summarization: abstractive through a completion client, or extractive offline.

use crate::llm::{CompletionClient, CompletionRequest, LlmClientError};
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You summarize document excerpts into concise, factual prose. \
Keep names, numbers and dates. Avoid speculation. Output a single paragraph.";

/// Produces the summary text stored for each unit.
#[derive(Clone)]
pub struct Summarizer {
    client: Option<Arc<dyn CompletionClient>>,
    model: String,
    max_words: usize,
}

impl std::fmt::Debug for Summarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Summarizer")
            .field("abstractive", &self.client.is_some())
            .field("model", &self.model)
            .field("max_words", &self.max_words)
            .finish()
    }
}

impl Summarizer {
    /// Summarizer backed by `client`, or extractive when `client` is `None`.
    pub fn new(
        client: Option<Arc<dyn CompletionClient>>,
        model: impl Into<String>,
        max_words: usize,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            max_words: max_words.max(1),
        }
    }

    /// Deterministic summarizer that keeps leading sentences.
    pub fn extractive(max_words: usize) -> Self {
        Self::new(None, String::new(), max_words)
    }

    /// Summarize one unit of text.
    pub async fn summarize(&self, text: &str) -> Result<String, LlmClientError> {
        let Some(client) = self.client.as_ref() else {
            return Ok(build_extractive_summary(text, self.max_words));
        };

        let summary = client
            .complete(CompletionRequest {
                model: self.model.clone(),
                system: Some(SYSTEM_PROMPT.to_string()),
                prompt: build_summary_prompt(text, self.max_words),
                max_tokens: Some(self.max_words.saturating_mul(2).max(64)),
                temperature: 0.0,
            })
            .await?;

        if summary.trim().is_empty() {
            return Err(LlmClientError::InvalidResponse(
                "provider returned an empty summary".into(),
            ));
        }
        Ok(summary)
    }
}

fn build_summary_prompt(text: &str, max_words: usize) -> String {
    format!(
        "Summarize the following document excerpt in at most {max_words} words.\n\n{}\n",
        text.trim()
    )
}

/// Leading sentences of `text` that fit within `max_words`.
///
/// A first sentence longer than the budget is cut at the budget.
pub(crate) fn build_extractive_summary(text: &str, max_words: usize) -> String {
    let mut kept: Vec<String> = Vec::new();
    let mut used_words = 0usize;

    for sentence in sentences(text) {
        let words = count_words(&sentence);
        if kept.is_empty() && words > max_words {
            return sentence
                .split_whitespace()
                .take(max_words)
                .collect::<Vec<_>>()
                .join(" ");
        }
        if used_words + words > max_words {
            break;
        }
        used_words += words;
        kept.push(sentence);
        if used_words == max_words {
            break;
        }
    }

    kept.join(" ")
}

fn sentences(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_inclusive(|c: char| matches!(c, '.' | '!' | '?'))
        .map(|sentence| sentence.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|sentence| !sentence.is_empty())
}

fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}
