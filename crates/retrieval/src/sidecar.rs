//! Remote retrieval sidecar client.
//!
//! The sidecar is the external vector-search service, consumed only
//! through its network contract: `GET /health` for readiness and
//! `POST /retrieve` for passage search. Reachability is probed at most
//! once per interval so adversarial or bursty traffic cannot turn every
//! question into a health check.

use crate::types::PassageMeta;
use pollkit_core::{AppError, AppResult, RetrievalConfig};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Cached outcome of the last health probe.
#[derive(Debug, Clone, Copy)]
struct ProbeState {
    reachable: bool,
    checked_at: Option<Instant>,
}

/// Request body for `POST /retrieve`.
#[derive(Debug, Serialize)]
struct RetrieveRequest<'a> {
    query: &'a str,
    top_k: usize,
}

/// Response body for `POST /retrieve`.
#[derive(Debug, Deserialize)]
struct RetrieveResponse {
    results: Vec<RetrieveHit>,
}

/// One hit in the sidecar's result list.
#[derive(Debug, Deserialize)]
struct RetrieveHit {
    #[allow(dead_code)]
    chunk_id: String,
    page_number: u32,
    section_title: String,
    chunk_content: String,
    score: f32,
    document_id: String,
    document_name: String,
}

impl From<RetrieveHit> for PassageMeta {
    fn from(hit: RetrieveHit) -> Self {
        PassageMeta {
            document_id: hit.document_id,
            document_name: hit.document_name,
            section_title: hit.section_title,
            page_number: hit.page_number,
            content: hit.chunk_content,
            relevance_score: hit.score,
        }
    }
}

/// HTTP client for the remote retrieval sidecar.
pub struct SidecarClient {
    base_url: String,
    client: reqwest::Client,
    probe_interval: Duration,
    health_timeout: Duration,
    retrieve_timeout: Duration,
    probe: Mutex<ProbeState>,
}

impl SidecarClient {
    /// Create a client from retrieval configuration.
    pub fn new(config: &RetrievalConfig) -> Self {
        Self {
            base_url: config.sidecar_endpoint.clone(),
            client: reqwest::Client::new(),
            probe_interval: Duration::from_secs(config.probe_interval_secs),
            health_timeout: Duration::from_secs(config.health_timeout_secs),
            retrieve_timeout: Duration::from_secs(config.retrieve_timeout_secs),
            probe: Mutex::new(ProbeState {
                reachable: false,
                checked_at: None,
            }),
        }
    }

    /// Whether the sidecar is currently considered reachable.
    ///
    /// Probes `GET /health` only when the cached verdict has aged past
    /// the probe interval. Concurrent callers may race into a duplicate
    /// probe; the last update wins, which converges within one interval.
    pub async fn is_reachable(&self) -> bool {
        {
            let state = self.probe.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(checked_at) = state.checked_at {
                if checked_at.elapsed() < self.probe_interval {
                    return state.reachable;
                }
            }
        }

        let reachable = self.probe_health().await;
        self.record_probe(reachable);
        reachable
    }

    /// Mark the sidecar unreachable for the remainder of the interval.
    ///
    /// Called after a failed retrieval so subsequent questions skip
    /// straight to the local fallback instead of re-timing-out.
    pub fn mark_unreachable(&self) {
        self.record_probe(false);
    }

    fn record_probe(&self, reachable: bool) {
        let mut state = self.probe.lock().unwrap_or_else(|e| e.into_inner());
        state.reachable = reachable;
        state.checked_at = Some(Instant::now());
    }

    async fn probe_health(&self) -> bool {
        let url = format!("{}/health", self.base_url);

        match self
            .client
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(response) => {
                let up = response.status().is_success();
                tracing::debug!("Sidecar health probe: up={}", up);
                up
            }
            Err(e) => {
                tracing::debug!("Sidecar health probe failed: {}", e);
                false
            }
        }
    }

    /// Retrieve passages for a question from the sidecar.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> AppResult<Vec<PassageMeta>> {
        let url = format!("{}/retrieve", self.base_url);

        let response = self
            .client
            .post(&url)
            .timeout(self.retrieve_timeout)
            .json(&RetrieveRequest { query, top_k })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(format!("Sidecar retrieval timed out: {}", e))
                } else {
                    AppError::Retrieval(format!("Sidecar request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::Retrieval(format!(
                "Sidecar error status: {}",
                status
            )));
        }

        let body: RetrieveResponse = response
            .json()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to parse sidecar response: {}", e)))?;

        Ok(body.results.into_iter().map(PassageMeta::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_conversion() {
        let hit = RetrieveHit {
            chunk_id: "c-42".to_string(),
            page_number: 7,
            section_title: "Closing the Polls".to_string(),
            chunk_content: "Seal the ballot box.".to_string(),
            score: 0.83,
            document_id: "doc-2".to_string(),
            document_name: "Election Day Procedures".to_string(),
        };

        let passage = PassageMeta::from(hit);
        assert_eq!(passage.document_name, "Election Day Procedures");
        assert_eq!(passage.page_number, 7);
        assert_eq!(passage.content, "Seal the ballot box.");
        assert_eq!(passage.relevance_score, 0.83);
    }

    #[test]
    fn test_retrieve_response_parsing() {
        let body = r#"{
            "results": [{
                "chunk_id": "c-1",
                "page_number": 3,
                "section_title": "Opening the Polls",
                "chunk_content": "Arrive by 5:30 AM.",
                "score": 0.91,
                "document_id": "doc-1",
                "document_name": "Poll Worker Training Manual 2026"
            }],
            "query": "what time"
        }"#;

        let parsed: RetrieveResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.results[0].score, 0.91);
    }

    /// Minimal HTTP listener answering every request with 200 and
    /// counting how many it served.
    async fn counting_health_server() -> (String, std::sync::Arc<std::sync::atomic::AtomicUsize>)
    {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));

        let server_hits = hits.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                server_hits.fetch_add(1, Ordering::SeqCst);

                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 200 OK\r\nconnection: close\r\ncontent-length: 0\r\n\r\n",
                    )
                    .await;
            }
        });

        (endpoint, hits)
    }

    #[tokio::test]
    async fn test_probe_verdict_cached_within_interval() {
        use std::sync::atomic::Ordering;

        let (endpoint, hits) = counting_health_server().await;
        let client = SidecarClient::new(&RetrievalConfig {
            sidecar_endpoint: endpoint,
            probe_interval_secs: 3600,
            ..RetrievalConfig::default()
        });

        // First call issues exactly one health probe
        assert!(client.is_reachable().await);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Cached verdict; the endpoint is not consulted again
        assert!(client.is_reachable().await);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // mark_unreachable flips the cached verdict without a probe
        client.mark_unreachable();
        assert!(!client.is_reachable().await);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
