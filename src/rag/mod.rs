//! Retrieval-augmented generation components
//!
//! Components:
//! - Retriever: over-fetching store search with keyword re-ranking
//! - Relevance Grader: concurrent per-passage verdicts
//! - Answer Synthesizer: evidence-conditioned or direct drafts
//! - Groundedness Checker: draft-vs-evidence verification
//! - Context Builder: `[source_id]` evidence blocks for prompts

pub mod checker;
pub mod citations;
pub mod context;
pub mod grader;
pub mod guard;
pub mod prompts;
pub mod reranking;
pub mod retrieval;
pub mod synthesizer;

// Re-export key types
pub use checker::GroundednessChecker;
pub use citations::cited_sources;
pub use context::{AssembledContext, ContextBuilder, ContextConfig};
pub use grader::{GradingReport, RelevanceGrader};
pub use guard::guarded;
pub use prompts::PromptKind;
pub use reranking::{RankingStrategy, ReRankConfig, ReRanker};
pub use retrieval::Retriever;
pub use synthesizer::AnswerSynthesizer;
