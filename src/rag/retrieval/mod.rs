//! Retrieval module
pub mod engine;

pub use engine::Retriever;
