//! Retriever over a document store
//!
//! `retrieve(query_text, k)` returns at most `k` passages in descending score
//! order with no repeated source identifier. Two calls with the same inputs
//! against an unchanged store give the same ordered result.
//! `retrieve_scoped` applies the same contract to chunks passing a metadata
//! filter.

use std::sync::Arc;
use tracing::debug;

use crate::errors::{RagError, Result};
use crate::rag::reranking::ReRanker;
use crate::store::{DocumentStore, MetadataFilter};
use crate::types::{Passage, RetrievalResult};

/// Retriever wrapping a document store with over-fetch and re-ranking
pub struct Retriever {
    store: Arc<dyn DocumentStore>,
    reranker: ReRanker,
    overfetch: usize,
}

impl Retriever {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            reranker: ReRanker::new(),
            overfetch: 2,
        }
    }

    /// Candidates fetched per passage kept (at least 1)
    pub fn with_overfetch(mut self, overfetch: usize) -> Self {
        self.overfetch = overfetch.max(1);
        self
    }

    pub fn with_reranker(mut self, reranker: ReRanker) -> Self {
        self.reranker = reranker;
        self
    }

    /// Retrieve up to `k` ranked, deduplicated passages
    pub async fn retrieve(&self, query_text: &str, k: usize) -> Result<RetrievalResult> {
        self.retrieve_scoped(query_text, k, None).await
    }

    /// Retrieve from chunks passing `filter`; `None` or an empty filter searches everything
    pub async fn retrieve_scoped(
        &self,
        query_text: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<RetrievalResult> {
        let query_text = query_text.trim();
        if query_text.is_empty() {
            return Err(RagError::Retrieval("Query text is empty".to_string()));
        }
        if k == 0 {
            return Err(RagError::Retrieval("k must be at least 1".to_string()));
        }

        let fetch = k.saturating_mul(self.overfetch);
        let filter = filter.filter(|f| !f.is_empty());
        let hits = match filter {
            Some(filter) => self.store.search_filtered(query_text, fetch, filter).await,
            None => self.store.search(query_text, fetch).await,
        }
        .map_err(|e| match e {
                RagError::Cancelled | RagError::Timeout { .. } | RagError::Retrieval(_) => e,
                other => RagError::Retrieval(format!("{} store: {}", self.store.name(), other)),
            })?;
        let fetched = hits.len();

        let passages: Vec<Passage> = self
            .reranker
            .rerank(hits, query_text, k)
            .into_iter()
            .map(|ranked| {
                Passage::new(ranked.chunk.content, ranked.chunk.source_id, ranked.reranked_score)
                    .with_metadata(ranked.chunk.metadata)
            })
            .collect();

        debug!(
            store = self.store.name(),
            fetched,
            kept = passages.len(),
            scoped = filter.is_some(),
            k,
            "retrieval complete"
        );
        Ok(RetrievalResult::new(query_text, passages))
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }
}
