//! Generation gateway: local model first, cloud fallback.
//!
//! Backend selection is per request. The local runtime is probed each
//! time because model availability can change quickly (a model may be
//! unloaded between two questions); if the probe or the stream open
//! fails, the request is served by the cloud backend instead. Exactly
//! one backend serves a given request — the two are never raced.

use crate::client::{ChatMessage, ChatRequest, ChatStream, LlmClient};
use pollkit_core::{AppError, AppResult, GenerationConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which backend produced an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationBackend {
    /// Locally hosted model runtime
    Local,
    /// Cloud chat-completion API
    Cloud,
}

/// Gateway over the local and cloud generation backends.
pub struct GenerationGateway {
    local: Arc<dyn LlmClient>,
    cloud: Arc<dyn LlmClient>,
    local_model: String,
    cloud_model: String,
    max_tokens: u32,
    temperature: f32,
}

impl GenerationGateway {
    /// Build a gateway from configuration.
    ///
    /// The cloud API key is resolved by the caller (it lives in an env
    /// var named by the config) so the gateway itself stays testable.
    pub fn from_config(config: &GenerationConfig, cloud_api_key: Option<String>) -> Self {
        Self {
            local: Arc::new(crate::providers::OllamaClient::with_base_url(
                &config.local_endpoint,
            )),
            cloud: Arc::new(crate::providers::OpenAiClient::new(
                &config.cloud_endpoint,
                cloud_api_key,
            )),
            local_model: config.local_model.clone(),
            cloud_model: config.cloud_model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    /// Build a gateway from explicit clients. Used by tests.
    pub fn with_clients(
        local: Arc<dyn LlmClient>,
        cloud: Arc<dyn LlmClient>,
        config: &GenerationConfig,
    ) -> Self {
        Self {
            local,
            cloud,
            local_model: config.local_model.clone(),
            cloud_model: config.cloud_model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    fn request_for(&self, messages: &[ChatMessage], model: &str) -> ChatRequest {
        ChatRequest::new(messages.to_vec(), model)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .with_streaming()
    }

    /// Open a generation stream for the given conversation.
    ///
    /// Returns the backend that accepted the request together with the
    /// delta stream. Fails with [`AppError::GenerationUnavailable`] only
    /// when both backends refuse.
    pub async fn generate(
        &self,
        messages: &[ChatMessage],
    ) -> AppResult<(GenerationBackend, ChatStream)> {
        if self.local.is_available().await {
            let request = self.request_for(messages, &self.local_model);

            match self.local.stream(&request).await {
                Ok(stream) => {
                    tracing::debug!("Generation served by local backend");
                    return Ok((GenerationBackend::Local, stream));
                }
                Err(e) => {
                    tracing::warn!("Local generation failed, falling back to cloud: {}", e);
                }
            }
        } else {
            tracing::debug!("Local generation backend unavailable");
        }

        if self.cloud.is_available().await {
            let request = self.request_for(messages, &self.cloud_model);

            match self.cloud.stream(&request).await {
                Ok(stream) => {
                    tracing::debug!("Generation served by cloud backend");
                    return Ok((GenerationBackend::Cloud, stream));
                }
                Err(e) => {
                    tracing::error!("Cloud generation failed: {}", e);
                }
            }
        } else {
            tracing::debug!("Cloud generation backend unavailable");
        }

        Err(AppError::GenerationUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ChatResponse, ChatStreamChunk};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted backend: serves a fixed text as a two-chunk stream, or
    /// refuses entirely.
    struct ScriptedClient {
        name: &'static str,
        available: bool,
        text: &'static str,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn up(name: &'static str, text: &'static str) -> Self {
            Self {
                name,
                available: true,
                text,
                calls: AtomicUsize::new(0),
            }
        }

        fn down(name: &'static str) -> Self {
            Self {
                name,
                available: false,
                text: "",
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedClient {
        fn provider_name(&self) -> &str {
            self.name
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        async fn complete(&self, _request: &ChatRequest) -> AppResult<ChatResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ChatResponse {
                content: self.text.to_string(),
                model: "scripted".to_string(),
            })
        }

        async fn stream(&self, _request: &ChatRequest) -> AppResult<ChatStream> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let chunks = vec![
                Ok(ChatStreamChunk {
                    content: self.text.to_string(),
                    done: false,
                }),
                Ok(ChatStreamChunk {
                    content: String::new(),
                    done: true,
                }),
            ];
            Ok(Box::pin(futures::stream::iter(chunks)))
        }
    }

    fn test_config() -> GenerationConfig {
        GenerationConfig::default()
    }

    #[tokio::test]
    async fn test_local_preferred_when_available() {
        let local = Arc::new(ScriptedClient::up("local", "local answer"));
        let cloud = Arc::new(ScriptedClient::up("cloud", "cloud answer"));
        let gateway =
            GenerationGateway::with_clients(local.clone(), cloud.clone(), &test_config());

        let (backend, _stream) = gateway
            .generate(&[ChatMessage::user("question")])
            .await
            .unwrap();

        assert_eq!(backend, GenerationBackend::Local);
        assert_eq!(local.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cloud.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cloud_fallback_when_local_down() {
        let local = Arc::new(ScriptedClient::down("local"));
        let cloud = Arc::new(ScriptedClient::up("cloud", "cloud answer"));
        let gateway =
            GenerationGateway::with_clients(local.clone(), cloud.clone(), &test_config());

        let (backend, _stream) = gateway
            .generate(&[ChatMessage::user("question")])
            .await
            .unwrap();

        assert_eq!(backend, GenerationBackend::Cloud);
        assert_eq!(local.calls.load(Ordering::SeqCst), 0);
        assert_eq!(cloud.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_both_down_is_unavailable() {
        let local = Arc::new(ScriptedClient::down("local"));
        let cloud = Arc::new(ScriptedClient::down("cloud"));
        let gateway = GenerationGateway::with_clients(local, cloud, &test_config());

        let result = gateway.generate(&[ChatMessage::user("question")]).await;

        assert!(matches!(result, Err(AppError::GenerationUnavailable)));
    }

    #[test]
    fn test_backend_serialization() {
        assert_eq!(
            serde_json::to_string(&GenerationBackend::Local).unwrap(),
            "\"local\""
        );
        assert_eq!(
            serde_json::to_string(&GenerationBackend::Cloud).unwrap(),
            "\"cloud\""
        );
    }
}
