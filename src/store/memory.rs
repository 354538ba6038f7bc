//! In-memory document store
//!
//! Scores chunks by term overlap with the query (set cosine over lowercase
//! word tokens, stopwords removed). Deterministic: equal scores are ordered
//! by source identifier.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::errors::Result;
use crate::store::{DocumentChunk, DocumentStore, MetadataFilter, StoredChunk};

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "does", "for", "from", "has", "how", "in",
    "is", "it", "of", "on", "or", "that", "the", "this", "to", "was", "what", "when", "where",
    "which", "who", "why", "with",
];

/// Lowercase word tokens with stopwords removed
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

#[derive(Debug, Clone)]
struct IndexedChunk {
    chunk: DocumentChunk,
    terms: HashSet<String>,
}

/// Term-overlap store held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    chunks: Vec<IndexedChunk>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_chunks(chunks: impl IntoIterator<Item = DocumentChunk>) -> Self {
        let mut store = Self::new();
        for chunk in chunks {
            store.insert(chunk);
        }
        store
    }

    /// Add a chunk; an existing chunk with the same source identifier is replaced
    pub fn insert(&mut self, chunk: DocumentChunk) {
        let terms = tokenize(&chunk.content);
        let indexed = IndexedChunk { chunk, terms };
        match self
            .chunks
            .iter_mut()
            .find(|c| c.chunk.source_id == indexed.chunk.source_id)
        {
            Some(existing) => *existing = indexed,
            None => self.chunks.push(indexed),
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn score(query_terms: &HashSet<String>, chunk_terms: &HashSet<String>) -> f32 {
        if query_terms.is_empty() || chunk_terms.is_empty() {
            return 0.0;
        }
        let overlap = query_terms.intersection(chunk_terms).count() as f32;
        overlap / ((query_terms.len() * chunk_terms.len()) as f32).sqrt()
    }

    /// Top `k` scored chunks among those `keep` admits
    fn ranked(
        &self,
        query_text: &str,
        k: usize,
        keep: impl Fn(&DocumentChunk) -> bool,
    ) -> Vec<StoredChunk> {
        let query_terms = tokenize(query_text);

        let mut hits: Vec<StoredChunk> = self
            .chunks
            .iter()
            .filter(|c| keep(&c.chunk))
            .filter_map(|c| {
                let score = Self::score(&query_terms, &c.terms);
                (score > 0.0).then(|| StoredChunk {
                    content: c.chunk.content.clone(),
                    source_id: c.chunk.source_id.clone(),
                    score,
                    metadata: c.chunk.metadata.clone(),
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.source_id.cmp(&b.source_id))
        });
        hits.truncate(k);
        hits
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn search(&self, query_text: &str, k: usize) -> Result<Vec<StoredChunk>> {
        Ok(self.ranked(query_text, k, |_| true))
    }

    async fn search_filtered(
        &self,
        query_text: &str,
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<StoredChunk>> {
        Ok(self.ranked(query_text, k, |chunk| filter.matches(&chunk.metadata)))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryStore {
        InMemoryStore::from_chunks(vec![
            DocumentChunk::new("aeb.md#0", "AEB test scenarios for car-to-car rear braking"),
            DocumentChunk::new("aeb.md#1", "Scoring of AEB pedestrian scenarios"),
            DocumentChunk::new("lss.md#0", "Lane support systems and lane keeping assist"),
        ])
    }

    #[test]
    fn test_tokenize_drops_stopwords() {
        let terms = tokenize("What is the AEB scoring?");
        assert!(terms.contains("aeb"));
        assert!(terms.contains("scoring"));
        assert!(!terms.contains("the"));
    }

    #[tokio::test]
    async fn test_search_orders_by_score() {
        let hits = store().search("AEB scenarios scoring", 3).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].source_id, "aeb.md#1");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_search_respects_k() {
        let hits = store().search("AEB scenarios", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_store_returns_nothing() {
        let hits = InMemoryStore::new().search("capital of France", 4).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_filter_applies_before_top_k() {
        let mut store = store();
        let mut v2 = DocumentChunk::new("aeb_v2.md#0", "AEB scenarios scoring pedestrian");
        v2.metadata.insert("version".to_string(), serde_json::json!("2.0"));
        store.insert(v2);

        let unfiltered = store.search("AEB scenarios scoring pedestrian", 1).await.unwrap();
        assert_eq!(unfiltered[0].source_id, "aeb.md#1");

        let filter = MetadataFilter::new().version("2.0");
        let hits = store
            .search_filtered("AEB scenarios scoring pedestrian", 3, &filter)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source_id, "aeb_v2.md#0");

        let none = store
            .search_filtered("AEB scenarios", 3, &MetadataFilter::new().version("9"))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_insert_replaces_same_source() {
        let mut store = store();
        store.insert(DocumentChunk::new("lss.md#0", "replaced"));
        assert_eq!(store.len(), 3);
    }
}
