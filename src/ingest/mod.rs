//! Document ingestion
//!
//! Populates a document store before any query runs. The workflow core never
//! calls into this module.

pub mod chunker;
pub mod loader;
pub mod metadata;

pub use chunker::{MarkdownChunker, DEFAULT_MAX_CHUNK_CHARS};
pub use loader::{build_memory_store, ingest_into_qdrant, load_corpus};
pub use metadata::{MetadataIndex, METADATA_FILE};
