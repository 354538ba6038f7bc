//! Answer synthesizer
//!
//! With accepted passages the draft is conditioned on them and cites their
//! source ids; with none it is answered from world knowledge and marked
//! ungrounded by design.

use std::sync::Arc;
use tracing::debug;

use crate::errors::{RagError, Result};
use crate::llm::{CompletionOptions, ReasoningBackend};
use crate::rag::context::ContextBuilder;
use crate::rag::prompts;
use crate::types::{Draft, Passage};

pub struct AnswerSynthesizer {
    backend: Arc<dyn ReasoningBackend>,
    options: CompletionOptions,
    context: ContextBuilder,
}

impl AnswerSynthesizer {
    pub fn new(backend: Arc<dyn ReasoningBackend>, options: CompletionOptions) -> Self {
        Self {
            backend,
            options,
            context: ContextBuilder::new(),
        }
    }

    pub fn with_context(mut self, context: ContextBuilder) -> Self {
        self.context = context;
        self
    }

    /// Produce a draft; `strict` asks for claims limited to the evidence
    pub async fn synthesize(&self, query_text: &str, accepted: &[Passage], strict: bool) -> Result<Draft> {
        let prompt = if accepted.is_empty() {
            prompts::synthesize_direct(query_text)
        } else {
            let evidence = self.context.build(accepted);
            prompts::synthesize_with_evidence(query_text, &evidence.text, strict)
        };

        let reply = self
            .backend
            .complete(&prompt, &self.options)
            .await
            .map_err(|e| RagError::Synthesis(e.to_string()))?;
        let text = reply.trim();
        if text.is_empty() {
            return Err(RagError::Synthesis("Backend returned an empty answer".to_string()));
        }

        debug!(passages = accepted.len(), strict, chars = text.len(), "draft synthesized");
        Ok(Draft::conditioned(text, accepted.to_vec()))
    }
}
