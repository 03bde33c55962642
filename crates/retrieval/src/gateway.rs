//! Retrieval gateway: remote sidecar first, local index fallback.

use crate::context::build_context;
use crate::local::LocalIndex;
use crate::sidecar::SidecarClient;
use crate::types::{RetrievalResult, RetrievalSource};
use pollkit_core::RetrievalConfig;

/// Trait seam between the orchestrator and passage retrieval.
///
/// Retrieval never fails the request: total failure of both tiers
/// yields an empty result and the pipeline proceeds without context.
#[async_trait::async_trait]
pub trait PassageRetriever: Send + Sync {
    async fn retrieve(&self, question: &str, top_k: usize) -> RetrievalResult;
}

/// Two-tier retrieval over the remote sidecar and the local index.
pub struct RetrievalGateway {
    sidecar: SidecarClient,
    local: LocalIndex,
    local_top_k: usize,
}

impl RetrievalGateway {
    pub fn new(config: &RetrievalConfig, local: LocalIndex) -> Self {
        Self {
            sidecar: SidecarClient::new(config),
            local,
            local_top_k: config.local_top_k,
        }
    }

    fn local_result(&self, question: &str, top_k: usize) -> RetrievalResult {
        // The local tier returns fewer passages; trigram similarity gets
        // noisy past the first few hits.
        let passages = self.local.search(question, self.local_top_k.min(top_k));
        let context_text = build_context(&passages);

        RetrievalResult {
            passages,
            context_text,
            source: RetrievalSource::Local,
        }
    }
}

#[async_trait::async_trait]
impl PassageRetriever for RetrievalGateway {
    async fn retrieve(&self, question: &str, top_k: usize) -> RetrievalResult {
        if self.sidecar.is_reachable().await {
            match self.sidecar.retrieve(question, top_k).await {
                Ok(passages) => {
                    tracing::debug!("Retrieved {} passages from sidecar", passages.len());
                    let context_text = build_context(&passages);
                    return RetrievalResult {
                        passages,
                        context_text,
                        source: RetrievalSource::Remote,
                    };
                }
                Err(e) => {
                    tracing::warn!("Sidecar retrieval failed, using local index: {}", e);
                    self.sidecar.mark_unreachable();
                }
            }
        } else {
            tracing::debug!("Sidecar unreachable, using local index");
        }

        let result = self.local_result(question, top_k);
        if result.is_empty() {
            tracing::warn!("Both retrieval tiers returned nothing; proceeding without context");
        } else {
            tracing::debug!("Retrieved {} passages from local index", result.passages.len());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::SnapshotChunk;

    fn gateway_with_dead_sidecar() -> RetrievalGateway {
        let config = RetrievalConfig {
            sidecar_endpoint: "http://127.0.0.1:1".to_string(),
            health_timeout_secs: 1,
            ..RetrievalConfig::default()
        };

        let local = LocalIndex::from_chunks(vec![SnapshotChunk {
            document_id: "doc-1".to_string(),
            document_name: "Poll Worker Training Manual 2026".to_string(),
            section_title: "Section 1 — Opening the Polls".to_string(),
            page_number: 3,
            content: "Poll workers must arrive at the polling place by 5:30 AM.".to_string(),
        }]);

        RetrievalGateway::new(&config, local)
    }

    #[tokio::test]
    async fn test_falls_back_to_local_index() {
        let gateway = gateway_with_dead_sidecar();
        let result = gateway
            .retrieve("what time should poll workers arrive", 5)
            .await;

        assert_eq!(result.source, RetrievalSource::Local);
        assert!(!result.is_empty());
        assert!(result.context_text.contains("Poll Worker Training Manual 2026"));
    }

    #[tokio::test]
    async fn test_total_failure_yields_empty_result() {
        let config = RetrievalConfig {
            sidecar_endpoint: "http://127.0.0.1:1".to_string(),
            health_timeout_secs: 1,
            ..RetrievalConfig::default()
        };
        let gateway = RetrievalGateway::new(&config, LocalIndex::empty());

        let result = gateway.retrieve("anything at all", 5).await;

        assert!(result.is_empty());
        assert!(result.context_text.is_empty());
    }
}
