//! Corpus loading into document stores

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::ingest::chunker::MarkdownChunker;
use crate::ingest::metadata::MetadataIndex;
use crate::store::{DocumentChunk, InMemoryStore, QdrantStore};

const EXTENSIONS: &[&str] = &["md", "markdown", "txt"];

/// Markdown and text files under `dir`, recursively, in path order
fn corpus_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let entries = std::fs::read_dir(&current)
            .with_context(|| format!("Failed to read directory: {}", current.display()))?;
        for entry in entries {
            let path = entry
                .with_context(|| format!("Failed to read entry in {}", current.display()))?
                .path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| EXTENSIONS.contains(&e.to_lowercase().as_str()))
                .unwrap_or(false)
            {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Chunk every corpus file under `dir`, stamping sidecar metadata onto each chunk
pub fn load_corpus(dir: &Path, chunker: &MarkdownChunker) -> Result<Vec<DocumentChunk>> {
    if !dir.is_dir() {
        anyhow::bail!("Corpus directory not found: {}", dir.display());
    }
    let index = MetadataIndex::load(dir)?;

    let mut chunks = Vec::new();
    for path in corpus_files(dir)? {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let source = path
            .strip_prefix(dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");

        let mut file_chunks = chunker.chunk(&source, &text);
        for chunk in &mut file_chunks {
            index.apply(&source, &mut chunk.metadata)?;
        }
        debug!(file = %source, chunks = file_chunks.len(), described = index.get(&source).is_some(), "file chunked");
        chunks.extend(file_chunks);
    }

    info!(dir = %dir.display(), chunks = chunks.len(), "corpus loaded");
    Ok(chunks)
}

/// In-memory store holding the chunked corpus
pub fn build_memory_store(dir: &Path, chunker: &MarkdownChunker) -> Result<InMemoryStore> {
    Ok(InMemoryStore::from_chunks(load_corpus(dir, chunker)?))
}

/// Embed and upsert the chunked corpus; returns the number of points written
pub async fn ingest_into_qdrant(
    store: &QdrantStore,
    dir: &Path,
    chunker: &MarkdownChunker,
) -> Result<usize> {
    let chunks = load_corpus(dir, chunker)?;
    let written = store
        .upsert(&chunks)
        .await
        .with_context(|| format!("Failed to ingest into collection {}", store.collection()))?;
    info!(collection = store.collection(), written, "corpus ingested");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentStore, MetadataFilter};
    use tempfile::TempDir;

    fn corpus() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.md"), "# Lane\nLane support systems\n").unwrap();
        std::fs::write(dir.path().join("a.md"), "# AEB\nAEB pedestrian scoring\n").unwrap();
        std::fs::write(dir.path().join("skip.pdf"), "binary").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.txt"), "Cyclist notes").unwrap();
        dir
    }

    #[test]
    fn test_load_corpus_in_path_order() {
        let dir = corpus();
        let chunks = load_corpus(dir.path(), &MarkdownChunker::default()).unwrap();
        let ids: Vec<_> = chunks.iter().map(|c| c.source_id.as_str()).collect();
        assert_eq!(ids, vec!["a.md#0", "b.md#0", "nested/c.txt#0"]);
    }

    #[test]
    fn test_missing_dir_errors() {
        let dir = TempDir::new().unwrap();
        let result = load_corpus(&dir.path().join("absent"), &MarkdownChunker::default());
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_sidecar_metadata_scopes_search() {
        let dir = corpus();
        std::fs::write(dir.path().join("a_v2.md"), "# AEB\nAEB pedestrian scoring revised\n").unwrap();
        std::fs::write(
            dir.path().join("metadata.toml"),
            "[documents.\"a.md\"]\nversion = \"1.0\"\nstart_date = \"2018-01-01\"\nend_date = \"2022-12-31\"\n\n\
             [documents.\"a_v2.md\"]\nversion = \"2.0\"\nstart_date = \"2023-01-01\"\nend_date = \"2025-12-31\"\n",
        )
        .unwrap();

        let chunks = load_corpus(dir.path(), &MarkdownChunker::default()).unwrap();
        let a = chunks.iter().find(|c| c.source_id == "a.md#0").unwrap();
        assert_eq!(a.metadata["version"], serde_json::json!("1.0"));
        assert_eq!(a.metadata["file_name"], serde_json::json!("a.md"));
        assert!(!chunks.iter().any(|c| c.source_id.starts_with("metadata")));

        let store = InMemoryStore::from_chunks(chunks);
        let filter = MetadataFilter::new().effective_on("2024-03-01").unwrap();
        let hits = store
            .search_filtered("AEB pedestrian scoring", 4, &filter)
            .await
            .unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.source_id.as_str()).collect();
        assert_eq!(ids, vec!["a_v2.md#0"]);
    }

    #[tokio::test]
    async fn test_memory_store_is_searchable() {
        let dir = corpus();
        let store = build_memory_store(dir.path(), &MarkdownChunker::default()).unwrap();
        assert_eq!(store.len(), 3);

        let hits = store.search("pedestrian scoring", 2).await.unwrap();
        assert_eq!(hits[0].source_id, "a.md#0");
    }
}
