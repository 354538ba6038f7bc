//! Qdrant-backed document store
//!
//! Chunks live in one collection; each point carries the chunk text under
//! `document`, its `source_id`, and the ingestion metadata as payload.

#![allow(deprecated)]

use anyhow::Context;
use async_trait::async_trait;
use qdrant_client::{
    client::QdrantClient,
    qdrant::{
        value::Kind, vectors_config::Config, with_payload_selector::SelectorOptions, Condition,
        CreateCollection, Distance, Filter, PointStruct, Range, SearchPoints, Value as QdrantValue,
        VectorParams, VectorsConfig, WithPayloadSelector,
    },
};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::{RagError, Result};
use crate::store::filter::{END_DATE_KEY, PROTOCOL_TYPE_KEY, START_DATE_KEY, VERSION_KEY};
use crate::store::{DocumentChunk, DocumentStore, Embedder, MetadataFilter, StoredChunk};

/// Default Qdrant gRPC endpoint
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

/// Default collection name
pub const DEFAULT_COLLECTION: &str = "agentrag_documents";

const DOCUMENT_KEY: &str = "document";
const SOURCE_KEY: &str = "source_id";

/// Vector store over a Qdrant collection
pub struct QdrantStore {
    client: QdrantClient,
    collection: String,
    embedder: Arc<dyn Embedder>,
    min_score: f32,
}

impl QdrantStore {
    /// Connect to Qdrant; the collection is not created until ingestion
    pub fn connect(
        url: &str,
        collection: &str,
        embedder: Arc<dyn Embedder>,
        min_score: f32,
    ) -> Result<Self> {
        let client = QdrantClient::from_url(url)
            .build()
            .context("Failed to create Qdrant client")?;

        Ok(Self {
            client,
            collection: collection.to_string(),
            embedder,
            min_score,
        })
    }

    /// Create the collection with cosine distance if it does not exist
    pub async fn ensure_collection(&self, dimension: u64) -> Result<()> {
        let collections = self
            .client
            .list_collections()
            .await
            .context("Failed to list collections")?;
        let exists = collections
            .collections
            .iter()
            .any(|c| c.name == self.collection);

        if !exists {
            info!(collection = %self.collection, dimension, "creating collection");
            self.client
                .create_collection(&CreateCollection {
                    collection_name: self.collection.clone(),
                    vectors_config: Some(VectorsConfig {
                        config: Some(Config::Params(VectorParams {
                            size: dimension,
                            distance: Distance::Cosine.into(),
                            ..Default::default()
                        })),
                    }),
                    ..Default::default()
                })
                .await
                .with_context(|| format!("Failed to create collection: {}", self.collection))?;
        }
        Ok(())
    }

    /// Embed and upsert chunks; returns the number written
    pub async fn upsert(&self, chunks: &[DocumentChunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut points = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let embedding = self.embedder.embed(&chunk.content).await?;
            if points.is_empty() {
                self.ensure_collection(embedding.len() as u64).await?;
            }

            let mut payload: HashMap<String, QdrantValue> = chunk
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), json_to_qdrant_value(v.clone())))
                .collect();
            payload.insert(DOCUMENT_KEY.to_string(), QdrantValue::from(chunk.content.clone()));
            payload.insert(SOURCE_KEY.to_string(), QdrantValue::from(chunk.source_id.clone()));

            // stable id per source so re-ingestion overwrites in place
            points.push(PointStruct::new(
                Uuid::new_v5(&Uuid::NAMESPACE_URL, chunk.source_id.as_bytes()).to_string(),
                embedding,
                payload,
            ));
        }

        let written = points.len();
        self.client
            .upsert_points_blocking(&self.collection, None, points, None)
            .await
            .context("Failed to upsert points")?;
        debug!(collection = %self.collection, written, "chunks upserted");
        Ok(written)
    }

    /// Number of stored points
    pub async fn count(&self) -> Result<u64> {
        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .context("Failed to get collection info")?;
        Ok(info.result.and_then(|r| r.points_count).unwrap_or(0))
    }

    /// Whether the server answers at all
    pub async fn health_check(&self) -> bool {
        self.client.health_check().await.is_ok()
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

impl QdrantStore {
    async fn search_points(
        &self,
        query_text: &str,
        k: usize,
        filter: Option<Filter>,
    ) -> Result<Vec<StoredChunk>> {
        let vector = self.embedder.embed(query_text).await?;

        let response = self
            .client
            .search_points(&SearchPoints {
                collection_name: self.collection.clone(),
                vector,
                limit: k as u64,
                with_payload: Some(WithPayloadSelector {
                    selector_options: Some(SelectorOptions::Enable(true)),
                }),
                score_threshold: Some(self.min_score),
                filter,
                ..Default::default()
            })
            .await
            .map_err(|e| RagError::Store(format!("Search failed: {}", e)))?;

        let hits = response
            .result
            .into_iter()
            .map(|point| {
                let mut content = String::new();
                let mut source_id = String::new();
                let mut metadata = serde_json::Map::new();
                for (key, value) in point.payload {
                    match key.as_str() {
                        DOCUMENT_KEY => content = qdrant_value_to_string(&value).unwrap_or_default(),
                        SOURCE_KEY => source_id = qdrant_value_to_string(&value).unwrap_or_default(),
                        _ => {
                            if let Some(json) = qdrant_to_json_value(&value) {
                                metadata.insert(key, json);
                            }
                        }
                    }
                }
                StoredChunk {
                    content,
                    source_id,
                    score: point.score,
                    metadata,
                }
            })
            .filter(|hit| !hit.source_id.is_empty())
            .collect();

        Ok(hits)
    }
}

#[async_trait]
impl DocumentStore for QdrantStore {
    async fn search(&self, query_text: &str, k: usize) -> Result<Vec<StoredChunk>> {
        self.search_points(query_text, k, None).await
    }

    async fn search_filtered(
        &self,
        query_text: &str,
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<StoredChunk>> {
        self.search_points(query_text, k, qdrant_filter(filter)).await
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}

/// Payload conditions equivalent to `MetadataFilter::matches`
fn qdrant_filter(filter: &MetadataFilter) -> Option<Filter> {
    let mut conditions = Vec::new();
    if let Some(version) = &filter.version {
        conditions.push(Condition::matches(VERSION_KEY, version.clone()));
    }
    if let Some(protocol_type) = &filter.protocol_type {
        conditions.push(Condition::matches(PROTOCOL_TYPE_KEY, protocol_type.clone()));
    }
    if let Some(day) = filter.effective_on {
        let day = day as f64;
        conditions.push(Condition::range(
            START_DATE_KEY,
            Range {
                lte: Some(day),
                ..Default::default()
            },
        ));
        conditions.push(Condition::range(
            END_DATE_KEY,
            Range {
                gte: Some(day),
                ..Default::default()
            },
        ));
    }

    if conditions.is_empty() {
        None
    } else {
        Some(Filter::must(conditions))
    }
}

fn json_to_qdrant_value(json: JsonValue) -> QdrantValue {
    match json {
        JsonValue::String(s) => QdrantValue::from(s),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                QdrantValue::from(i)
            } else if let Some(f) = n.as_f64() {
                QdrantValue::from(f)
            } else {
                QdrantValue::from(0i64)
            }
        }
        JsonValue::Bool(b) => QdrantValue::from(b),
        other => QdrantValue::from(other.to_string()),
    }
}

fn qdrant_to_json_value(value: &QdrantValue) -> Option<JsonValue> {
    value.kind.as_ref().and_then(|kind| match kind {
        Kind::StringValue(s) => Some(JsonValue::String(s.clone())),
        Kind::IntegerValue(i) => Some(JsonValue::Number((*i).into())),
        Kind::DoubleValue(f) => serde_json::Number::from_f64(*f).map(JsonValue::Number),
        Kind::BoolValue(b) => Some(JsonValue::Bool(*b)),
        _ => None,
    })
}

fn qdrant_value_to_string(value: &QdrantValue) -> Option<String> {
    match value.kind.as_ref()? {
        Kind::StringValue(s) => Some(s.clone()),
        _ => None,
    }
}
