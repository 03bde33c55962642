//! Answer cache.
//!
//! Key-normalized, schema-versioned in-memory map from question to
//! answered entry. Entries written under an older schema version are
//! treated as misses and left in place (lazy invalidation); a `put`
//! overwrites unconditionally. Unbounded — an LRU cap is a production
//! hardening left as an extension point.

use chrono::{DateTime, Utc};
use pollkit_retrieval::PassageMeta;
use std::collections::HashMap;
use std::sync::Mutex;

/// Current cache entry schema. Bump when the answer format changes;
/// every existing entry then misses on its next lookup.
pub const CACHE_SCHEMA_VERSION: u32 = 3;

/// A cached answer.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Full answer text, including the trailing source line
    pub answer_text: String,

    /// Citation extracted from the answer; empty when the answer did
    /// not carry the source marker
    pub cited_source: String,

    /// Snapshot of the passages behind the citation; empty when
    /// `cited_source` is empty
    pub source_meta: Vec<PassageMeta>,

    pub created_at: DateTime<Utc>,

    pub schema_version: u32,
}

impl CacheEntry {
    pub fn new(answer_text: String, cited_source: String, source_meta: Vec<PassageMeta>) -> Self {
        Self {
            answer_text,
            cited_source,
            source_meta,
            created_at: Utc::now(),
            schema_version: CACHE_SCHEMA_VERSION,
        }
    }
}

/// Normalize a question into its cache key: lowercase with whitespace
/// collapsed to single spaces.
pub fn normalize_question(question: &str) -> String {
    question
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Concurrent answer cache shared by all request handlers.
///
/// A plain mutex-guarded map: critical sections are a lookup or an
/// insert, never an await. Two concurrent identical misses may both
/// generate and both write; the last write wins.
pub struct AnswerCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl AnswerCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up an answer. Returns `None` on a stale schema version.
    pub fn get(&self, question: &str) -> Option<CacheEntry> {
        let key = normalize_question(question);
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        entries
            .get(&key)
            .filter(|entry| entry.schema_version == CACHE_SCHEMA_VERSION)
            .cloned()
    }

    /// Store an answer, overwriting any existing entry for the key.
    pub fn put(&self, question: &str, entry: CacheEntry) {
        let key = normalize_question(question);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AnswerCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_is_idempotent() {
        assert_eq!(
            normalize_question("  What TIME  do I arrive? "),
            "what time do i arrive?"
        );
        assert_eq!(
            normalize_question("what time do i arrive?"),
            "what time do i arrive?"
        );
        assert_eq!(
            normalize_question(&normalize_question("  What TIME  do I arrive? ")),
            normalize_question("  What TIME  do I arrive? ")
        );
    }

    #[test]
    fn test_get_put_with_normalized_keys() {
        let cache = AnswerCache::new();
        cache.put(
            "  What TIME  do I arrive? ",
            CacheEntry::new("By 5:30 AM.".to_string(), "Manual".to_string(), vec![]),
        );

        let hit = cache.get("what time do i arrive?").unwrap();
        assert_eq!(hit.answer_text, "By 5:30 AM.");
        assert_eq!(hit.cited_source, "Manual");
    }

    #[test]
    fn test_miss_on_unknown_question() {
        let cache = AnswerCache::new();
        assert!(cache.get("never asked").is_none());
    }

    #[test]
    fn test_stale_schema_is_a_miss_not_a_delete() {
        let cache = AnswerCache::new();

        let mut entry = CacheEntry::new("old".to_string(), String::new(), vec![]);
        entry.schema_version = CACHE_SCHEMA_VERSION - 1;
        cache.put("question", entry);

        assert!(cache.get("question").is_none());
        // Lazy invalidation: the stale entry stays until overwritten
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_put_overwrites() {
        let cache = AnswerCache::new();
        cache.put(
            "q",
            CacheEntry::new("first".to_string(), String::new(), vec![]),
        );
        cache.put(
            "q",
            CacheEntry::new("second".to_string(), String::new(), vec![]),
        );

        assert_eq!(cache.get("q").unwrap().answer_text, "second");
        assert_eq!(cache.len(), 1);
    }
}
