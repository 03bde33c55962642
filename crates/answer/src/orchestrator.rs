//! Answer orchestrator.
//!
//! Drives one question through the pipeline:
//! `Guarding -> (Blocked | CacheCheck) -> (hit -> Emitting | miss ->
//! Retrieving -> Generating -> Caching -> Emitting) -> Done`.
//!
//! Each request runs in its own spawned producer task pushing
//! [`AnswerEvent`]s into a bounded channel; generation is the only
//! streaming phase. The producer checks every send, so a consumer that
//! disconnects mid-answer stops the pipeline without a cache write.

use crate::audit::{AuditRecord, AuditSink};
use crate::cache::{AnswerCache, CacheEntry};
use crate::events::{stream_from_receiver, AnswerEvent, AnswerStream};
use crate::guard::{GuardVerdict, InjectionGuard, REFUSAL_TEXT};
use crate::prompt::{build_messages, extract_cited_source};
use futures::StreamExt;
use pollkit_core::{AppError, AppResult};
use pollkit_llm::{ChatMessage, GenerationGateway};
use pollkit_retrieval::{PassageRetriever, RetrievalResult};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Event channel depth; backpressure for slow consumers.
const EVENT_BUFFER: usize = 8;

fn default_language() -> String {
    "en".to_string()
}

fn default_actor_type() -> String {
    "poll_worker".to_string()
}

/// An incoming question.
#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    /// The question text; a missing field is treated like an empty
    /// question and rejected up front
    #[serde(default)]
    pub question: String,

    /// Target answer language
    #[serde(default = "default_language")]
    pub language: String,

    /// Prior conversation turns, oldest first
    #[serde(default)]
    pub history: Vec<ChatMessage>,

    /// Who is asking; recorded in the audit trail
    #[serde(default = "default_actor_type", rename = "actorType")]
    pub actor_type: String,
}

impl AskRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            language: default_language(),
            history: Vec::new(),
            actor_type: default_actor_type(),
        }
    }
}

/// The question-answering service.
///
/// Owns the cache, guard, gateways, and audit sink explicitly; request
/// handlers share one instance through `Arc`. Identical concurrent
/// questions may both miss the cache and both generate — the last
/// write wins.
pub struct QaService {
    guard: InjectionGuard,
    cache: AnswerCache,
    retriever: Arc<dyn PassageRetriever>,
    generation: Arc<GenerationGateway>,
    audit: Arc<dyn AuditSink>,
    top_k: usize,
}

impl QaService {
    pub fn new(
        retriever: Arc<dyn PassageRetriever>,
        generation: Arc<GenerationGateway>,
        audit: Arc<dyn AuditSink>,
        top_k: usize,
    ) -> Self {
        Self {
            guard: InjectionGuard::new(),
            cache: AnswerCache::new(),
            retriever,
            generation,
            audit,
            top_k,
        }
    }

    /// Direct cache access. Used by tests and diagnostics.
    pub fn cache(&self) -> &AnswerCache {
        &self.cache
    }

    /// Answer a question as an event stream.
    ///
    /// Validates the input, then spawns the pipeline; the returned
    /// stream yields deltas as generation produces them and ends with a
    /// `Done` event (or a terminal error).
    pub fn answer(self: Arc<Self>, request: AskRequest) -> AppResult<AnswerStream> {
        if request.question.trim().is_empty() {
            return Err(AppError::InvalidInput("Question must not be empty".to_string()));
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        tokio::spawn(async move {
            self.run_pipeline(request, tx).await;
        });

        Ok(stream_from_receiver(rx))
    }

    async fn run_pipeline(&self, request: AskRequest, tx: mpsc::Sender<AppResult<AnswerEvent>>) {
        // Guarding
        if self.guard.check(&request.question) == GuardVerdict::Blocked {
            // Refusal only: no retrieval, no generation, no cache write,
            // and no audit record (see DESIGN.md)
            let _ = tx.send(Ok(AnswerEvent::Delta(REFUSAL_TEXT.to_string()))).await;
            let _ = tx
                .send(Ok(AnswerEvent::Done {
                    cited_source: String::new(),
                    source_meta: Vec::new(),
                    was_cached: false,
                    backend: None,
                }))
                .await;
            return;
        }

        // CacheCheck
        if let Some(entry) = self.cache.get(&request.question) {
            tracing::info!("Answer served from cache");
            self.emit_cached(&request, entry, tx).await;
            return;
        }

        // Retrieving: never fails the request; an empty result means
        // the answer is generated without context
        let retrieval = self.retriever.retrieve(&request.question, self.top_k).await;

        // Generating
        let messages = build_messages(
            &request.question,
            &request.language,
            &request.history,
            &retrieval.context_text,
        );

        match self.generation.generate(&messages).await {
            Ok((backend, stream)) => {
                self.forward_generation(&request, retrieval, backend, stream, tx)
                    .await;
            }
            Err(e) => {
                tracing::error!("Generation unavailable: {}", e);
                let _ = tx.send(Err(e)).await;
            }
        }
    }

    async fn emit_cached(
        &self,
        request: &AskRequest,
        entry: CacheEntry,
        tx: mpsc::Sender<AppResult<AnswerEvent>>,
    ) {
        if tx
            .send(Ok(AnswerEvent::Delta(entry.answer_text.clone())))
            .await
            .is_err()
        {
            return;
        }

        self.spawn_audit(request, &entry.answer_text, &entry.cited_source, true);

        let _ = tx
            .send(Ok(AnswerEvent::Done {
                cited_source: entry.cited_source,
                source_meta: entry.source_meta,
                was_cached: true,
                backend: None,
            }))
            .await;
    }

    async fn forward_generation(
        &self,
        request: &AskRequest,
        retrieval: RetrievalResult,
        backend: pollkit_llm::GenerationBackend,
        mut stream: pollkit_llm::ChatStream,
        tx: mpsc::Sender<AppResult<AnswerEvent>>,
    ) {
        let mut answer_text = String::new();

        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => {
                    if !chunk.content.is_empty() {
                        answer_text.push_str(&chunk.content);

                        if tx
                            .send(Ok(AnswerEvent::Delta(chunk.content)))
                            .await
                            .is_err()
                        {
                            // Consumer disconnected: stop pulling from the
                            // backend and leave the cache untouched
                            tracing::debug!("Consumer disconnected, abandoning generation");
                            return;
                        }
                    }

                    if chunk.done {
                        break;
                    }
                }
                Err(e) => {
                    // Late failure: partial output stays with the caller,
                    // nothing is cached or audited
                    tracing::error!("Generation stream failed: {}", e);
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            }
        }

        // Caching
        let cited_source = extract_cited_source(&answer_text);
        let source_meta = if cited_source.is_empty() {
            Vec::new()
        } else {
            retrieval.passages.clone()
        };

        self.cache.put(
            &request.question,
            CacheEntry::new(
                answer_text.clone(),
                cited_source.clone(),
                source_meta.clone(),
            ),
        );

        self.spawn_audit(request, &answer_text, &cited_source, false);

        // Emitting
        let _ = tx
            .send(Ok(AnswerEvent::Done {
                cited_source,
                source_meta,
                was_cached: false,
                backend: Some(backend),
            }))
            .await;
    }

    /// Emit an audit record without blocking the response path.
    fn spawn_audit(&self, request: &AskRequest, answer_text: &str, cited_source: &str, cached: bool) {
        let record = AuditRecord::new(
            &request.actor_type,
            &request.question,
            answer_text,
            cited_source,
            &request.language,
            cached,
        );
        let audit = Arc::clone(&self.audit);

        tokio::spawn(async move {
            if let Err(e) = audit.log_interaction(&record).await {
                tracing::warn!("Audit write failed (response unaffected): {}", e);
            }
        });
    }
}
