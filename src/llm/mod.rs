//! Reasoning backend module
//!
//! A single request/response capability, `complete(prompt, options)`, shared
//! by the router, grader, synthesizer, and checker with different prompts.

pub mod ollama;
pub mod parser;
pub mod retry;
pub mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

// Re-export commonly used types
pub use ollama::{OllamaClient, DEFAULT_MODEL, DEFAULT_OLLAMA_URL};
pub use parser::StreamDecoder;
pub use retry::RetryManager;
pub use scripted::{Reply, ScriptedBackend};

/// Per-call generation options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    /// Backend model name
    pub model: String,
    /// Determinism/creativity trade-off
    pub temperature: f32,
    /// Output length cap
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            max_tokens: 512,
        }
    }
}

impl CompletionOptions {
    pub fn new(model: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            temperature,
            max_tokens,
        }
    }
}

/// Remote model capability used by every reasoning component
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    /// Complete a prompt into text
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String>;

    /// Short backend name for logs
    fn name(&self) -> &str;
}
