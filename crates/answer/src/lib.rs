//! Answer pipeline for the pollkit answering service.
//!
//! Composes the injection guard, answer cache, retrieval gateway,
//! generation gateway, and audit sink into a single per-request state
//! machine, delivered to callers as an incremental event stream.

pub mod audit;
pub mod cache;
pub mod events;
pub mod guard;
pub mod orchestrator;
pub mod prompt;

// Re-export commonly used types
pub use audit::{AuditRecord, AuditSink, HttpAuditSink, NullAuditSink};
pub use cache::{normalize_question, AnswerCache, CacheEntry, CACHE_SCHEMA_VERSION};
pub use events::{AnswerEvent, AnswerStream};
pub use guard::{GuardVerdict, InjectionGuard, REFUSAL_TEXT};
pub use orchestrator::{AskRequest, QaService};
pub use prompt::{build_messages, extract_cited_source, SOURCE_MARKER};
