use super::{CompletionClient, CompletionRequest, LlmClientError};
use crate::http::RetryPolicy;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Chat completions client for OpenAI and API-compatible servers.
pub struct OpenAiCompletionClient {
    http: Client,
    endpoint: String,
    api_key: String,
    retry: RetryPolicy,
}

impl OpenAiCompletionClient {
    /// Build a client against `base_url` (for example `https://api.openai.com/v1`).
    pub fn new(http: Client, base_url: &str, api_key: String, retry: RetryPolicy) -> Self {
        Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            retry,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmClientError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });
        let body = ChatRequest {
            model: &request.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages,
        };

        let response = self
            .retry
            .send("chat completions", || {
                self.http
                    .post(&self.endpoint)
                    .bearer_auth(self.api_key.trim())
                    .json(&body)
            })
            .await
            .map_err(|error| {
                LlmClientError::ProviderUnavailable(format!(
                    "failed to call chat completions: {error}"
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmClientError::GenerationFailed(format!(
                "OpenAI returned {status}: {text}"
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|error| {
            LlmClientError::InvalidResponse(format!("failed to parse OpenAI response: {error}"))
        })?;
        Ok(parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default())
    }
}
