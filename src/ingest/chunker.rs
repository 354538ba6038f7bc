//! Markdown-aware chunking
//!
//! Splits on headings (outside fenced code blocks), then on blank lines when
//! a section is longer than the chunk limit, then on character count as a
//! last resort. Chunk ids are `<source>#<index>`.

use serde_json::{Map, Value};

use crate::store::DocumentChunk;

pub const DEFAULT_MAX_CHUNK_CHARS: usize = 1500;

#[derive(Debug, Clone)]
pub struct MarkdownChunker {
    max_chars: usize,
}

impl Default for MarkdownChunker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK_CHARS)
    }
}

struct Section {
    heading: Option<String>,
    body: String,
}

impl MarkdownChunker {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Chunk one document; `source` names it in ids and metadata
    pub fn chunk(&self, source: &str, text: &str) -> Vec<DocumentChunk> {
        let mut chunks = Vec::new();

        for section in split_sections(text) {
            for piece in self.split_to_limit(&section.body) {
                let index = chunks.len();
                let mut metadata = Map::new();
                metadata.insert("file_name".to_string(), Value::from(source));
                metadata.insert("chunk".to_string(), Value::from(index as u64));
                if let Some(heading) = &section.heading {
                    metadata.insert("heading".to_string(), Value::from(heading.as_str()));
                }

                let mut chunk = DocumentChunk::new(format!("{}#{}", source, index), piece);
                chunk.metadata = metadata;
                chunks.push(chunk);
            }
        }
        chunks
    }

    fn split_to_limit(&self, body: &str) -> Vec<String> {
        let body = body.trim();
        if body.is_empty() {
            return Vec::new();
        }
        if body.chars().count() <= self.max_chars {
            return vec![body.to_string()];
        }

        let mut pieces = Vec::new();
        let mut current = String::new();
        for paragraph in body.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            let needed = current.chars().count() + paragraph.chars().count() + 2;
            if !current.is_empty() && needed > self.max_chars {
                pieces.push(std::mem::take(&mut current));
            }

            if paragraph.chars().count() > self.max_chars {
                pieces.extend(hard_split(paragraph, self.max_chars));
                continue;
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(paragraph);
        }
        if !current.is_empty() {
            pieces.push(current);
        }
        pieces
    }
}

fn heading_text(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    if rest.is_empty() || rest.starts_with(' ') {
        Some(rest.trim())
    } else {
        None
    }
}

fn split_sections(text: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current = Section {
        heading: None,
        body: String::new(),
    };
    let mut in_fence = false;

    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }

        if !in_fence {
            if let Some(heading) = heading_text(line) {
                if !current.body.trim().is_empty() {
                    sections.push(current);
                }
                current = Section {
                    heading: Some(heading.to_string()),
                    body: String::new(),
                };
            }
        }

        current.body.push_str(line);
        current.body.push('\n');
    }
    if !current.body.trim().is_empty() {
        sections.push(current);
    }
    sections
}

fn hard_split(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|c| c.iter().collect::<String>())
        .collect()
}
