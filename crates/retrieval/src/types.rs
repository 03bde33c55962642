//! Retrieval result types.

use serde::{Deserialize, Serialize};

/// A retrieved passage with its provenance.
///
/// Produced by the retrieval gateway, ordered by descending relevance,
/// and never mutated after construction. The same snapshot travels into
/// cache entries and the terminal answer frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassageMeta {
    /// Identifier of the source document
    pub document_id: String,

    /// Human-readable document name (e.g., "Poll Worker Training Manual 2026")
    pub document_name: String,

    /// Section heading the passage belongs to
    pub section_title: String,

    /// Page the passage was extracted from
    pub page_number: u32,

    /// Passage text
    pub content: String,

    /// Similarity score assigned by whichever tier returned it
    pub relevance_score: f32,
}

/// Which retrieval tier produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalSource {
    /// Remote vector-search sidecar
    Remote,
    /// Local fallback index
    Local,
}

/// Result of a retrieval call.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    /// Passages ordered by descending relevance
    pub passages: Vec<PassageMeta>,

    /// Concatenated passages with provenance headers; deterministic for
    /// a given passage list (the generation prompt anchors citations to it)
    pub context_text: String,

    /// Tier that produced the passages
    pub source: RetrievalSource,
}

impl RetrievalResult {
    /// An empty result, used when both retrieval tiers fail.
    ///
    /// The pipeline proceeds with no context rather than aborting; some
    /// questions are answerable or safely refused without it.
    pub fn empty() -> Self {
        Self {
            passages: Vec::new(),
            context_text: String::new(),
            source: RetrievalSource::Local,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}
