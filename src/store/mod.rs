//! Document store module
//!
//! The core only ever reads from a store: `search(query_text, k)` must be
//! idempotent and side-effect-free. Writes happen through the ingestion
//! collaborator before any query runs. `search_filtered` scopes a search to
//! chunks whose metadata passes a [`MetadataFilter`].

pub mod filter;
pub mod memory;
pub mod qdrant;
pub mod embedding;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

// Re-export commonly used types
pub use embedding::{Embedder, OllamaEmbedder};
pub use filter::{date_key, MetadataFilter};
pub use memory::InMemoryStore;
pub use qdrant::QdrantStore;

/// A chunk of a source document, as written by ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub source_id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl DocumentChunk {
    pub fn new(source_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            content: content.into(),
            metadata: serde_json::Map::new(),
        }
    }
}

/// One similarity search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub content: String,
    pub source_id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Read-only similarity search over ingested chunks
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Up to `k` chunks in descending similarity order
    async fn search(&self, query_text: &str, k: usize) -> Result<Vec<StoredChunk>>;

    /// Up to `k` chunks passing `filter`, in descending similarity order
    ///
    /// The default drops non-matching hits from a plain search, so it may
    /// return fewer than `k` even when more matching chunks exist. Stores
    /// that can filter natively override it.
    async fn search_filtered(
        &self,
        query_text: &str,
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<StoredChunk>> {
        let hits = self.search(query_text, k).await?;
        Ok(hits
            .into_iter()
            .filter(|hit| filter.matches(&hit.metadata))
            .collect())
    }

    /// Short store name for logs
    fn name(&self) -> &str;
}
