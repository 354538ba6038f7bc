//! Re-ranking of store hits before they become passages
//!
//! The store is over-fetched, so the list handed in here is longer than `k`
//! and may repeat a source. Output is deduplicated, re-scored, ordered, and
//! cut to `k`; it depends only on its inputs.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::store::memory::tokenize;
use crate::store::StoredChunk;

/// Re-ranking strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankingStrategy {
    /// Use the store's similarity scores only
    Similarity,
    /// Similarity plus a boost for query keywords found in the passage
    KeywordBoost,
}

/// Re-ranking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReRankConfig {
    pub strategy: RankingStrategy,
    /// Maximum boost for exact keyword matches
    pub keyword_boost: f32,
}

impl Default for ReRankConfig {
    fn default() -> Self {
        Self {
            strategy: RankingStrategy::KeywordBoost,
            keyword_boost: 0.1,
        }
    }
}

/// Store hit with its re-ranked score
#[derive(Debug, Clone)]
pub struct RankedChunk {
    pub chunk: StoredChunk,
    pub original_score: f32,
    pub reranked_score: f32,
}

impl RankedChunk {
    pub fn boost_applied(&self) -> f32 {
        self.reranked_score - self.original_score
    }
}

/// Re-ranker for store hits
#[derive(Debug, Clone, Default)]
pub struct ReRanker {
    config: ReRankConfig,
}

impl ReRanker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ReRankConfig) -> Self {
        Self { config }
    }

    /// Deduplicate by source, re-score, order, and keep the best `k`
    pub fn rerank(&self, hits: Vec<StoredChunk>, query: &str, k: usize) -> Vec<RankedChunk> {
        let mut ranked: Vec<RankedChunk> = dedupe_by_source(hits)
            .into_iter()
            .map(|chunk| {
                let original_score = chunk.score;
                let reranked_score = self.compute_score(&chunk, query);
                RankedChunk {
                    chunk,
                    original_score,
                    reranked_score,
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.reranked_score
                .partial_cmp(&a.reranked_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.chunk.source_id.cmp(&b.chunk.source_id))
        });
        ranked.truncate(k);
        ranked
    }

    fn compute_score(&self, chunk: &StoredChunk, query: &str) -> f32 {
        match self.config.strategy {
            RankingStrategy::Similarity => chunk.score,
            RankingStrategy::KeywordBoost => chunk.score + self.compute_keyword_boost(chunk, query),
        }
    }

    /// Share of the query's keywords present in the passage, scaled to the boost cap
    fn compute_keyword_boost(&self, chunk: &StoredChunk, query: &str) -> f32 {
        let query_terms: Vec<String> = tokenize(query)
            .into_iter()
            .filter(|t| t.len() > 3)
            .collect();
        if query_terms.is_empty() {
            return 0.0;
        }

        let content_terms = tokenize(&chunk.content);
        let matches = query_terms
            .iter()
            .filter(|t| content_terms.contains(*t))
            .count();

        self.config.keyword_boost * matches as f32 / query_terms.len() as f32
    }

    pub fn config(&self) -> &ReRankConfig {
        &self.config
    }
}

/// One hit per source identifier, keeping the highest score; first-seen order
fn dedupe_by_source(hits: Vec<StoredChunk>) -> Vec<StoredChunk> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<StoredChunk> = Vec::with_capacity(hits.len());

    for hit in hits {
        match index.get(&hit.source_id) {
            Some(&i) => {
                if hit.score > unique[i].score {
                    unique[i] = hit;
                }
            }
            None => {
                index.insert(hit.source_id.clone(), unique.len());
                unique.push(hit);
            }
        }
    }
    unique
}
