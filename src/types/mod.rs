//! Type definitions module
//!
//! Core data model shared by every workflow component.

pub mod passage;
pub mod answer;

// Re-export commonly used types
pub use passage::{Passage, RelevanceVerdict, RetrievalResult};
pub use answer::{AnswerPath, AnswerReport, Draft, Groundedness, Query};
