//! agentrag - Agentic retrieval-augmented question answering
//!
//! Answers questions over a private document corpus with local Ollama models.
//! A bounded state machine routes each query, retrieves and grades evidence,
//! rewrites the query when nothing relevant comes back, and checks the final
//! answer against its sources before returning it.
//!
//! # Architecture
//!
//! - **agent**: stage machine, per-query state, router, orchestrator
//! - **rag**: retriever, grader, synthesizer, groundedness checker
//! - **llm** / **store**: reasoning backend and document store seams
//! - **budget**: shared retry budget across all loops of one query

pub mod errors;
pub mod types;
pub mod config;
pub mod budget;
pub mod llm;
pub mod store;
pub mod rag;
pub mod agent;
pub mod ingest;
pub mod telemetry;
pub mod cli;

// Re-export commonly used types
pub use agent::WorkflowOrchestrator;
pub use config::Config;
pub use errors::{RagError, Result};
pub use types::{AnswerReport, Query};
