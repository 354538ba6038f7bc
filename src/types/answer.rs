//! Query, draft, and caller-facing answer types

use serde::{Deserialize, Serialize};

use crate::agent::WorkflowStage;
use crate::store::MetadataFilter;
use crate::types::passage::Passage;

/// Immutable user question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub session_id: Option<String>,
    pub iteration: usize,
    /// Metadata scope applied to every retrieval of this query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<MetadataFilter>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            session_id: None,
            iteration: 0,
            filter: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Scope retrieval to chunks passing `filter`; an empty filter is dropped
    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = (!filter.is_empty()).then_some(filter);
        self
    }
}

/// Groundedness verdict of a draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Groundedness {
    /// Not checked yet
    Unset,
    /// Every material claim traces to an accepted passage
    Grounded,
    /// At least one claim is not supported by the passages
    Unsupported,
    /// Produced without evidence; never checked
    UngroundedByDesign,
}

/// Candidate answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub text: String,
    /// Passages the draft was conditioned on (empty on the direct path)
    pub passages: Vec<Passage>,
    pub groundedness: Groundedness,
}

impl Draft {
    /// Draft conditioned on evidence, pending a groundedness check
    pub fn conditioned(text: impl Into<String>, passages: Vec<Passage>) -> Self {
        let groundedness = if passages.is_empty() {
            Groundedness::UngroundedByDesign
        } else {
            Groundedness::Unset
        };
        Self {
            text: text.into(),
            passages,
            groundedness,
        }
    }

    /// Draft from world knowledge alone
    pub fn direct(text: impl Into<String>) -> Self {
        Self::conditioned(text, Vec::new())
    }

    /// Best-effort draft when no answer could be produced
    pub fn fallback(query_text: &str) -> Self {
        Self::direct(format!(
            "Sorry, an answer to \"{}\" could not be produced. Please try again or rephrase the question.",
            query_text
        ))
    }

    pub fn needs_check(&self) -> bool {
        !self.passages.is_empty()
    }

    pub fn is_grounded(&self) -> bool {
        self.groundedness == Groundedness::Grounded
    }
}

/// How the final answer was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerPath {
    /// Router judged retrieval unnecessary
    Direct,
    /// Answer conditioned on accepted passages
    Retrieval,
    /// Retrieval found nothing usable; answered from world knowledge
    Degraded,
    /// No draft could be synthesized
    Fallback,
}

/// Structured result returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerReport {
    pub answer: String,
    /// Cited source identifiers, in acceptance order
    pub sources: Vec<String>,
    pub grounded: bool,
    /// User-visible warning that the answer may be unsupported or low-confidence
    pub caveat: bool,
    /// Retrieval attempts made
    pub iterations: usize,
    pub low_confidence: bool,
    pub path: AnswerPath,
    /// Stages visited, in order
    pub trace: Vec<WorkflowStage>,
}

impl AnswerReport {
    /// Whether the given stage was ever entered
    pub fn visited(&self, stage: WorkflowStage) -> bool {
        self.trace.contains(&stage)
    }

    /// Stage entered right after the first occurrence of `stage`
    pub fn stage_after(&self, stage: WorkflowStage) -> Option<WorkflowStage> {
        let idx = self.trace.iter().position(|s| *s == stage)?;
        self.trace.get(idx + 1).copied()
    }
}
