//! Retrieved evidence types
//!
//! A `Passage` is created by the retriever and only ever gains a verdict from
//! the grader; everything else about it is fixed at creation.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Relevance verdict assigned by the grader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelevanceVerdict {
    /// Not graded yet
    Unset,
    /// Passage can help answer the query
    Relevant,
    /// Passage does not help, or grading failed
    Irrelevant,
}

/// A unit of retrieved evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    content: String,
    source_id: String,
    score: f32,
    verdict: RelevanceVerdict,
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
}

impl Passage {
    /// Create an ungraded passage
    pub fn new(content: impl Into<String>, source_id: impl Into<String>, score: f32) -> Self {
        Self {
            content: content.into(),
            source_id: source_id.into(),
            score,
            verdict: RelevanceVerdict::Unset,
            metadata: serde_json::Map::new(),
        }
    }

    /// Attach store metadata (file name, version, ...)
    pub fn with_metadata(mut self, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn verdict(&self) -> RelevanceVerdict {
        self.verdict
    }

    pub fn metadata(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.metadata
    }

    pub fn is_relevant(&self) -> bool {
        self.verdict == RelevanceVerdict::Relevant
    }

    /// Verdict assignment; reserved for the grader
    pub(crate) fn assign_verdict(&mut self, verdict: RelevanceVerdict) {
        self.verdict = verdict;
    }
}

/// Ordered passages from one retrieval attempt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Query text the store was searched with
    pub query_text: String,
    /// Passages in descending score order
    pub passages: Vec<Passage>,
}

impl RetrievalResult {
    pub fn new(query_text: impl Into<String>, passages: Vec<Passage>) -> Self {
        Self {
            query_text: query_text.into(),
            passages,
        }
    }

    /// Zero-passage result, used when the store is unavailable
    pub fn empty(query_text: impl Into<String>) -> Self {
        Self::new(query_text, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn source_ids(&self) -> Vec<&str> {
        self.passages.iter().map(|p| p.source_id()).collect()
    }

    /// Passages graded relevant, in retrieval order
    pub fn relevant(&self) -> impl Iterator<Item = &Passage> {
        self.passages.iter().filter(|p| p.is_relevant())
    }

    /// True when no two passages share a source identifier
    pub fn has_unique_sources(&self) -> bool {
        let mut seen = HashSet::new();
        self.passages.iter().all(|p| seen.insert(p.source_id()))
    }
}
