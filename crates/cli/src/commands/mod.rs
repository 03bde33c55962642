//! Command handlers for the pollkit CLI.

mod ask;
mod serve;

pub use ask::AskCommand;
pub use serve::ServeCommand;

use pollkit_answer::{AuditSink, HttpAuditSink, NullAuditSink, QaService};
use pollkit_core::{AppConfig, AppResult};
use pollkit_llm::GenerationGateway;
use pollkit_retrieval::{LocalIndex, RetrievalGateway};
use std::sync::Arc;

/// Wire the answering service together from configuration.
///
/// Shared by `serve` and `ask` so both exercise the identical pipeline.
pub fn build_service(config: &AppConfig) -> AppResult<Arc<QaService>> {
    let local_index = match &config.retrieval.chunk_snapshot {
        Some(path) if path.exists() => LocalIndex::load(path)?,
        Some(path) => {
            tracing::warn!(
                "Chunk snapshot {:?} not found; local retrieval fallback is empty",
                path
            );
            LocalIndex::empty()
        }
        None => LocalIndex::empty(),
    };

    let retriever = Arc::new(RetrievalGateway::new(&config.retrieval, local_index));

    let generation = Arc::new(GenerationGateway::from_config(
        &config.generation,
        config.resolve_cloud_api_key(),
    ));

    let audit: Arc<dyn AuditSink> = match &config.audit_endpoint {
        Some(endpoint) => Arc::new(HttpAuditSink::new(endpoint)),
        None => Arc::new(NullAuditSink),
    };

    Ok(Arc::new(QaService::new(
        retriever,
        generation,
        audit,
        config.retrieval.remote_top_k,
    )))
}
