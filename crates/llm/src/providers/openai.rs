//! OpenAI-compatible cloud generation backend.
//!
//! Used only as the fallback when the local runtime cannot serve a
//! request. Speaks the `/v1/chat/completions` contract with bearer
//! authentication, in both blocking and SSE-streaming form.

use super::lines::lines;
use crate::client::{
    ChatMessage, ChatRequest, ChatResponse, ChatStream, ChatStreamChunk, LlmClient,
};
use futures::StreamExt;
use pollkit_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeout for chat requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// SSE sentinel terminating an OpenAI stream.
const DONE_SENTINEL: &str = "[DONE]";

/// OpenAI chat API request format.
#[derive(Debug, Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

/// Non-streaming response body.
#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    model: String,
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

/// One SSE event of a streaming response.
#[derive(Debug, Deserialize)]
struct OpenAiStreamEvent {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat client.
pub struct OpenAiClient {
    /// Base URL for the API (e.g., https://api.openai.com)
    base_url: String,

    /// Bearer token; the backend is unavailable without one
    api_key: Option<String>,

    /// HTTP client
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a new client with a custom base URL and optional API key.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn to_openai_request(&self, request: &ChatRequest) -> OpenAiChatRequest {
        OpenAiChatRequest {
            model: request.model.clone(),
            messages: request.messages.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: request.stream,
        }
    }

    fn api_key(&self) -> AppResult<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::Generation("Cloud API key is not configured".to_string()))
    }

    fn map_error(e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(format!("Cloud request timed out: {}", e))
        } else {
            AppError::Generation(format!("Cloud request failed: {}", e))
        }
    }

    /// Parse one SSE line into a stream chunk, if it carries one.
    fn parse_sse_line(line: &str) -> Option<AppResult<ChatStreamChunk>> {
        let data = line.strip_prefix("data:")?.trim();

        if data.is_empty() {
            return None;
        }

        if data == DONE_SENTINEL {
            return Some(Ok(ChatStreamChunk {
                content: String::new(),
                done: true,
            }));
        }

        match serde_json::from_str::<OpenAiStreamEvent>(data) {
            Ok(event) => {
                let choice = event.choices.into_iter().next()?;
                Some(Ok(ChatStreamChunk {
                    content: choice.delta.content.unwrap_or_default(),
                    done: choice.finish_reason.is_some(),
                }))
            }
            Err(e) => Some(Err(AppError::Generation(format!(
                "Failed to parse stream event: {}",
                e
            )))),
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn is_available(&self) -> bool {
        // The cloud tier requires only credentials; network failures are
        // caught (and reported) by the actual call.
        self.api_key().is_ok()
    }

    async fn complete(&self, request: &ChatRequest) -> AppResult<ChatResponse> {
        tracing::info!("Sending completion request to cloud backend");

        let api_key = self.api_key()?.to_string();
        let mut openai_request = self.to_openai_request(request);
        openai_request.stream = false;

        let url = format!("{}/v1/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(api_key)
            .json(&openai_request)
            .send()
            .await
            .map_err(Self::map_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Generation(format!(
                "Cloud API error ({}): {}",
                status, error_text
            )));
        }

        let openai_response: OpenAiChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Generation(format!("Failed to parse cloud response: {}", e)))?;

        let content = openai_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(ChatResponse {
            content,
            model: openai_response.model,
        })
    }

    async fn stream(&self, request: &ChatRequest) -> AppResult<ChatStream> {
        tracing::info!("Starting streaming request to cloud backend");

        let api_key = self.api_key()?.to_string();
        let mut openai_request = self.to_openai_request(request);
        openai_request.stream = true;

        let url = format!("{}/v1/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(api_key)
            .json(&openai_request)
            .send()
            .await
            .map_err(Self::map_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Generation(format!(
                "Cloud API error ({}): {}",
                status, error_text
            )));
        }

        // SSE events can arrive split across reads; reassemble complete
        // lines before parsing
        let stream = lines(response.bytes_stream()).filter_map(|result| {
            futures::future::ready(match result {
                Ok(line) => Self::parse_sse_line(&line),
                Err(e) => Some(Err(e)),
            })
        });

        Ok(Box::pin(stream))
    }
}
