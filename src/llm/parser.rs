//! Incremental decoder for streamed generate responses
//!
//! Ollama streams one JSON object per chunk, but network reads do not respect
//! object boundaries. The decoder buffers bytes and cuts complete objects out
//! with a string-aware bracket match:
//!
//! ```text
//! depth ← 0, start ← None
//! for each byte b at i (outside string literals):
//!   '{' → if depth = 0 { start ← i }; depth += 1
//!   '}' → depth -= 1; if depth = 0 { emit B[start..=i] }
//! ```

use serde::Deserialize;

use crate::errors::{RagError, Result};

/// Maximum buffered bytes before the stream is considered corrupt (1MB)
pub const MAX_BUFFER_SIZE: usize = 1_048_576;

/// One streamed generate chunk
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GenerateChunk {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Incremental stream decoder
#[derive(Debug)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
    max_buffer_size: usize,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::with_capacity(MAX_BUFFER_SIZE)
    }

    pub fn with_capacity(max_buffer_size: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            max_buffer_size,
        }
    }

    /// Add bytes and return every chunk completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<GenerateChunk>> {
        if self.buffer.len() + bytes.len() > self.max_buffer_size {
            return Err(RagError::StreamDecode(format!(
                "Buffer overflow: {} bytes exceeds maximum {}",
                self.buffer.len() + bytes.len(),
                self.max_buffer_size
            )));
        }
        self.buffer.extend_from_slice(bytes);

        let mut chunks = Vec::new();
        while let Some((start, end)) = self.find_complete_object()? {
            let raw = String::from_utf8_lossy(&self.buffer[start..=end]).to_string();
            self.buffer.drain(..=end);

            let chunk: GenerateChunk = serde_json::from_str(&raw)
                .map_err(|e| RagError::StreamDecode(format!("Bad chunk: {}", e)))?;
            if let Some(error) = chunk.error {
                return Err(RagError::Backend(error));
            }
            chunks.push(chunk);
        }
        Ok(chunks)
    }

    fn find_complete_object(&self) -> Result<Option<(usize, usize)>> {
        let mut depth: i64 = 0;
        let mut start: Option<usize> = None;
        let mut in_string = false;
        let mut escape_next = false;

        for (i, &byte) in self.buffer.iter().enumerate() {
            if escape_next {
                escape_next = false;
                continue;
            }
            match byte {
                b'\\' if in_string => escape_next = true,
                b'"' => in_string = !in_string,
                _ if in_string => {}
                b'{' => {
                    if depth == 0 {
                        start = Some(i);
                    }
                    depth += 1;
                }
                b'}' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(RagError::StreamDecode(
                            "Mismatched braces: too many closing braces".to_string(),
                        ));
                    }
                    if depth == 0 {
                        if let Some(s) = start {
                            return Ok(Some((s, i)));
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(None)
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    /// Whether only whitespace remains buffered
    pub fn is_drained(&self) -> bool {
        self.buffer.iter().all(|b| b.is_ascii_whitespace())
    }
}
