//! Audit sink interface.
//!
//! Audit storage is an external collaborator; this module defines the
//! consumed interface and an HTTP transport for it. The orchestrator
//! emits exactly one record per answered question, fire-and-forget: a
//! sink failure is logged and never affects the response already sent.

use chrono::{DateTime, Utc};
use pollkit_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeout for audit posts.
const AUDIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Structured record of an answered question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub actor_type: String,
    pub question: String,
    pub answer_text: String,
    pub cited_source: String,
    pub language: String,
    pub flagged: bool,
    pub cached: bool,
}

impl AuditRecord {
    /// Create a record for an answered question.
    pub fn new(
        actor_type: &str,
        question: &str,
        answer_text: &str,
        cited_source: &str,
        language: &str,
        cached: bool,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            actor_type: actor_type.to_string(),
            question: question.to_string(),
            answer_text: answer_text.to_string(),
            cited_source: cited_source.to_string(),
            language: language.to_string(),
            flagged: false,
            cached,
        }
    }
}

/// Consumed interface of the external audit store.
#[async_trait::async_trait]
pub trait AuditSink: Send + Sync {
    async fn log_interaction(&self, record: &AuditRecord) -> AppResult<()>;
}

/// Audit sink posting records to a configured HTTP endpoint.
pub struct HttpAuditSink {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpAuditSink {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl AuditSink for HttpAuditSink {
    async fn log_interaction(&self, record: &AuditRecord) -> AppResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(AUDIT_TIMEOUT)
            .json(record)
            .send()
            .await
            .map_err(|e| AppError::Audit(format!("Audit post failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Audit(format!(
                "Audit endpoint returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// Sink used when no audit endpoint is configured; records are dropped
/// after a debug log line.
pub struct NullAuditSink;

#[async_trait::async_trait]
impl AuditSink for NullAuditSink {
    async fn log_interaction(&self, record: &AuditRecord) -> AppResult<()> {
        tracing::debug!(
            "Audit (no endpoint configured): question answered, cached={}",
            record.cached
        );
        Ok(())
    }
}
