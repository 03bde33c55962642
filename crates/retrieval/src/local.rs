//! Local fallback retrieval index.
//!
//! When the sidecar is unreachable, retrieval falls back to a cosine
//! search over previously ingested chunks, embedded with deterministic
//! character-trigram vectors. Not semantically accurate like a neural
//! model, but content-dependent, offline, and good enough to keep the
//! pipeline answering while the sidecar is down.

use crate::types::PassageMeta;
use pollkit_core::{AppError, AppResult};
use serde::Deserialize;
use std::path::Path;

/// Embedding dimension for the trigram vectors.
const EMBEDDING_DIM: usize = 384;

/// Minimum cosine similarity for a chunk to be considered relevant.
const MIN_RELEVANCE_SCORE: f32 = 0.20;

/// One ingested chunk as stored in the JSON snapshot.
///
/// The snapshot is produced by the external ingestion pipeline; this
/// index only reads it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotChunk {
    pub document_id: String,
    pub document_name: String,
    pub section_title: String,
    pub page_number: u32,
    pub content: String,
}

struct IndexedChunk {
    chunk: SnapshotChunk,
    embedding: Vec<f32>,
}

/// In-memory fallback index over ingested document chunks.
pub struct LocalIndex {
    chunks: Vec<IndexedChunk>,
}

impl LocalIndex {
    /// Build an empty index. Searches return nothing.
    pub fn empty() -> Self {
        Self { chunks: Vec::new() }
    }

    /// Build an index from chunks already in memory.
    pub fn from_chunks(chunks: Vec<SnapshotChunk>) -> Self {
        let chunks = chunks
            .into_iter()
            .map(|chunk| {
                let embedding = trigram_embedding(&chunk.content);
                IndexedChunk { chunk, embedding }
            })
            .collect();

        Self { chunks }
    }

    /// Load a JSON chunk snapshot and index it.
    pub fn load(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Retrieval(format!("Failed to read chunk snapshot {:?}: {}", path, e))
        })?;

        let chunks: Vec<SnapshotChunk> = serde_json::from_str(&contents).map_err(|e| {
            AppError::Retrieval(format!("Failed to parse chunk snapshot {:?}: {}", path, e))
        })?;

        tracing::info!("Loaded {} chunks into local fallback index", chunks.len());

        Ok(Self::from_chunks(chunks))
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Search the index, returning up to `top_k` passages ordered by
    /// descending similarity. Low-similarity chunks are filtered out.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<PassageMeta> {
        let query_embedding = trigram_embedding(query);

        let mut scored: Vec<(f32, &IndexedChunk)> = self
            .chunks
            .iter()
            .map(|indexed| (cosine_similarity(&query_embedding, &indexed.embedding), indexed))
            .filter(|(score, _)| *score >= MIN_RELEVANCE_SCORE)
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(top_k)
            .map(|(score, indexed)| PassageMeta {
                document_id: indexed.chunk.document_id.clone(),
                document_name: indexed.chunk.document_name.clone(),
                section_title: indexed.chunk.section_title.clone(),
                page_number: indexed.chunk.page_number,
                content: indexed.chunk.content.clone(),
                relevance_score: score,
            })
            .collect()
    }
}

/// Deterministic character-trigram embedding.
///
/// Words are mapped onto vector dimensions through trigram and
/// whole-word hashes, frequency-weighted, then normalized to a unit
/// vector. Identical text always produces an identical vector.
fn trigram_embedding(text: &str) -> Vec<f32> {
    let mut embedding = vec![0.0; EMBEDDING_DIM];

    let lower = text.to_lowercase();

    // Filter stop words for better discrimination
    let stop_words: std::collections::HashSet<&str> = [
        "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to",
        "of", "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have",
        "has", "had", "it", "its", "their", "they", "them",
    ]
    .iter()
    .copied()
    .collect();

    let words: Vec<&str> = lower
        .split_whitespace()
        .filter(|w| !stop_words.contains(w) && w.len() > 2)
        .collect();

    let mut word_freq = std::collections::HashMap::new();
    for word in &words {
        *word_freq.entry(*word).or_insert(0) += 1;
    }

    for (word, freq) in word_freq.iter() {
        let chars: Vec<char> = word.chars().collect();
        for i in 0..chars.len().saturating_sub(2) {
            let trigram = format!(
                "{}{}{}",
                chars[i],
                chars[i + 1],
                chars.get(i + 2).unwrap_or(&' ')
            );
            let trigram_hash = trigram
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(37).wrapping_add(b as u64));

            let dim_idx = (trigram_hash as usize) % EMBEDDING_DIM;
            embedding[dim_idx] += (*freq as f32).sqrt();
        }

        // Also encode the whole word
        let word_hash = word
            .bytes()
            .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let base_dim = (word_hash as usize) % EMBEDDING_DIM;
        embedding[base_dim] += *freq as f32;
    }

    // Normalize to unit vector
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut embedding {
            *v /= norm;
        }
    }

    embedding
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    // Both vectors are unit-normalized, so the dot product suffices
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual_chunks() -> Vec<SnapshotChunk> {
        vec![
            SnapshotChunk {
                document_id: "doc-1".to_string(),
                document_name: "Poll Worker Training Manual 2026".to_string(),
                section_title: "Section 1 — Opening the Polls".to_string(),
                page_number: 3,
                content: "Poll workers must arrive at the polling place by 5:30 AM to set up \
                          voting equipment before polls open."
                    .to_string(),
            },
            SnapshotChunk {
                document_id: "doc-1".to_string(),
                document_name: "Poll Worker Training Manual 2026".to_string(),
                section_title: "Section 9 — Closing the Polls".to_string(),
                page_number: 41,
                content: "After the last voter has cast a ballot, seal the ballot box and \
                          complete the reconciliation forms."
                    .to_string(),
            },
        ]
    }

    #[test]
    fn test_embedding_deterministic() {
        let text = "what time should poll workers arrive";
        assert_eq!(trigram_embedding(text), trigram_embedding(text));
    }

    #[test]
    fn test_embedding_normalized() {
        let embedding = trigram_embedding("opening the polls at dawn");
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedding = trigram_embedding("");
        assert!(embedding.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_search_ranks_relevant_chunk_first() {
        let index = LocalIndex::from_chunks(manual_chunks());
        let results = index.search("what time should poll workers arrive to set up", 2);

        assert!(!results.is_empty());
        assert_eq!(results[0].section_title, "Section 1 — Opening the Polls");
        // Descending order
        for pair in results.windows(2) {
            assert!(pair[0].relevance_score >= pair[1].relevance_score);
        }
    }

    #[test]
    fn test_search_respects_top_k() {
        let index = LocalIndex::from_chunks(manual_chunks());
        let results = index.search("polls ballot workers arrive seal", 1);
        assert!(results.len() <= 1);
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = LocalIndex::empty();
        assert!(index.search("anything", 5).is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn test_load_snapshot() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{
                "documentId": "doc-1",
                "documentName": "Poll Worker Training Manual 2026",
                "sectionTitle": "Section 1 — Opening the Polls",
                "pageNumber": 3,
                "content": "Arrive by 5:30 AM."
            }}]"#
        )
        .unwrap();

        let index = LocalIndex::load(file.path()).unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_load_missing_snapshot_errors() {
        let result = LocalIndex::load(Path::new("/nonexistent/chunks.json"));
        assert!(result.is_err());
    }
}
