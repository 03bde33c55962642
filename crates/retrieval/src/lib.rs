//! Passage retrieval for the pollkit answering service.
//!
//! Two-tier retrieval: a remote vector-search sidecar (probed with a
//! cached health check) with a local trigram-embedding index as the
//! fallback. Both tiers produce the same [`RetrievalResult`] shape, and
//! total failure degrades to an empty result rather than an error.

pub mod context;
pub mod gateway;
pub mod local;
pub mod sidecar;
pub mod types;

// Re-export commonly used types
pub use context::build_context;
pub use gateway::{PassageRetriever, RetrievalGateway};
pub use local::{LocalIndex, SnapshotChunk};
pub use sidecar::SidecarClient;
pub use types::{PassageMeta, RetrievalResult, RetrievalSource};
