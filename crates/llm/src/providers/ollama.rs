//! Ollama generation backend.
//!
//! This module provides integration with Ollama, a local LLM runtime.
//! Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md

use super::lines::lines;
use crate::client::{
    ChatMessage, ChatRequest, ChatResponse, ChatStream, ChatStreamChunk, LlmClient,
};
use futures::StreamExt;
use pollkit_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeout for the availability probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Timeout for chat requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Ollama chat API request format.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Ollama chat API response format (one NDJSON object per chunk).
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    model: String,
    message: Option<OllamaChatMessage>,
    done: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaChatMessage {
    content: String,
}

/// Ollama chat client.
pub struct OllamaClient {
    /// Base URL for the Ollama API
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client with default settings.
    ///
    /// Default URL: http://localhost:11434
    pub fn new() -> Self {
        Self::with_base_url("http://localhost:11434")
    }

    /// Create a new Ollama client with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Convert ChatRequest to Ollama format.
    fn to_ollama_request(&self, request: &ChatRequest) -> OllamaChatRequest {
        OllamaChatRequest {
            model: request.model.clone(),
            messages: request.messages.clone(),
            stream: request.stream,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        }
    }

    /// Parse one NDJSON line of a streaming response.
    fn parse_chunk_line(line: &str) -> AppResult<ChatStreamChunk> {
        let ollama_response: OllamaChatResponse = serde_json::from_str(line)
            .map_err(|e| AppError::Generation(format!("Failed to parse chunk: {}", e)))?;

        Ok(ChatStreamChunk {
            content: ollama_response
                .message
                .map(|m| m.content)
                .unwrap_or_default(),
            done: ollama_response.done,
        })
    }

    /// Map a reqwest error, distinguishing deadline overruns.
    fn map_error(e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(format!("Ollama request timed out: {}", e))
        } else {
            AppError::Generation(format!("Ollama request failed: {}", e))
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/version", self.base_url);

        match self
            .client
            .get(&url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Ollama availability probe failed: {}", e);
                false
            }
        }
    }

    async fn complete(&self, request: &ChatRequest) -> AppResult<ChatResponse> {
        tracing::info!("Sending completion request to Ollama");
        tracing::debug!("Request: {:?}", request);

        let mut ollama_request = self.to_ollama_request(request);
        ollama_request.stream = false;

        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(&ollama_request)
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
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        // For non-streaming, Ollama returns a single JSON object
        let ollama_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Generation(format!("Failed to parse Ollama response: {}", e)))?;

        tracing::info!("Received completion from Ollama");

        Ok(ChatResponse {
            content: ollama_response
                .message
                .map(|m| m.content)
                .unwrap_or_default(),
            model: ollama_response.model,
        })
    }

    async fn stream(&self, request: &ChatRequest) -> AppResult<ChatStream> {
        tracing::info!("Starting streaming request to Ollama");
        tracing::debug!("Request: {:?}", request);

        let mut ollama_request = self.to_ollama_request(request);
        ollama_request.stream = true;

        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(&ollama_request)
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
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        // Ollama sends newline-delimited JSON; reassemble objects split
        // across reads before parsing
        let stream = lines(response.bytes_stream())
            .map(|result| result.and_then(|line| Self::parse_chunk_line(&line)));

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_client_creation() {
        let client = OllamaClient::new();
        assert_eq!(client.provider_name(), "ollama");
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_ollama_request_conversion() {
        let client = OllamaClient::new();
        let request = ChatRequest::new(vec![ChatMessage::user("Hello")], "llama3.2")
            .with_temperature(0.1)
            .with_max_tokens(512);

        let ollama_req = client.to_ollama_request(&request);
        assert_eq!(ollama_req.model, "llama3.2");
        assert_eq!(ollama_req.messages.len(), 1);
        assert_eq!(ollama_req.options.temperature, Some(0.1));
        assert_eq!(ollama_req.options.num_predict, Some(512));
    }

    #[test]
    fn test_ollama_chunk_parsing() {
        let line = r#"{"model":"llama3.2","message":{"role":"assistant","content":"Arrive"},"done":false}"#;
        let chunk = OllamaClient::parse_chunk_line(line).unwrap();
        assert_eq!(chunk.content, "Arrive");
        assert!(!chunk.done);

        let final_line = r#"{"model":"llama3.2","message":{"role":"assistant","content":""},"done":true}"#;
        let chunk = OllamaClient::parse_chunk_line(final_line).unwrap();
        assert!(chunk.done);
    }

    #[tokio::test]
    async fn test_object_split_across_reads_still_parses() {
        let payload =
            b"{\"model\":\"llama3.2\",\"message\":{\"role\":\"assistant\",\"content\":\"Arrive\"},\"done\":false}\n"
                .to_vec();
        // Cut inside the content string, as a packet boundary would
        let (head, tail) = payload.split_at(50);
        let body = futures::stream::iter(vec![
            Ok::<_, reqwest::Error>(head.to_vec()),
            Ok(tail.to_vec()),
        ]);

        let chunks: Vec<_> = lines(body)
            .map(|result| result.and_then(|line| OllamaClient::parse_chunk_line(&line)))
            .collect()
            .await;

        assert_eq!(chunks.len(), 1);
        let chunk = chunks[0].as_ref().unwrap();
        assert_eq!(chunk.content, "Arrive");
        assert!(!chunk.done);
    }
}
