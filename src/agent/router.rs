//! Query router
//!
//! Decides whether a query needs retrieval and, after a failed retrieval
//! attempt, rewrites the search text.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::{RagError, Result};
use crate::llm::{CompletionOptions, ReasoningBackend};
use crate::rag::prompts;

/// Routing decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteDecision {
    /// Answer from general reasoning, skip retrieval
    Direct,
    /// Search the corpus
    Retrieve,
    /// Rewrite before searching
    Reformulate,
}

impl RouteDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteDecision::Direct => "DIRECT",
            RouteDecision::Retrieve => "RETRIEVE",
            RouteDecision::Reformulate => "REFORMULATE",
        }
    }
}

pub struct QueryRouter {
    backend: Arc<dyn ReasoningBackend>,
    options: CompletionOptions,
    today: Option<String>,
}

impl QueryRouter {
    pub fn new(backend: Arc<dyn ReasoningBackend>, options: CompletionOptions) -> Self {
        Self {
            backend,
            options,
            today: None,
        }
    }

    /// Pin the date shown to the model instead of reading the clock
    pub fn with_today(mut self, today: impl Into<String>) -> Self {
        self.today = Some(today.into());
        self
    }

    fn today(&self) -> String {
        self.today
            .clone()
            .unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string())
    }

    /// Route a query; `history` carries notes from earlier attempts
    pub async fn route(&self, query_text: &str, history: &[String]) -> Result<RouteDecision> {
        let prompt = prompts::route(query_text, &self.today(), history);
        let reply = self
            .backend
            .complete(&prompt, &self.options)
            .await
            .map_err(|e| RagError::Routing(e.to_string()))?;

        match prompts::parse_keyword(&reply, &["DIRECT", "RETRIEVE", "REFORMULATE"]) {
            Some("DIRECT") => Ok(RouteDecision::Direct),
            Some("RETRIEVE") => Ok(RouteDecision::Retrieve),
            Some(_) => Ok(RouteDecision::Reformulate),
            None => Err(RagError::Routing(format!(
                "Unrecognized decision: {}",
                reply.trim()
            ))),
        }
    }

    /// Rewritten search text for another retrieval attempt
    pub async fn reformulate(
        &self,
        original: &str,
        current: &str,
        history: &[String],
    ) -> Result<String> {
        let prompt = prompts::reformulate(original, current, history);
        let reply = self
            .backend
            .complete(&prompt, &self.options)
            .await
            .map_err(|e| RagError::Routing(e.to_string()))?;

        let rewritten = reply
            .lines()
            .map(|l| l.trim().trim_matches('"').trim())
            .find(|l| !l.is_empty())
            .unwrap_or_default();
        if rewritten.is_empty() {
            return Err(RagError::Routing("Empty reformulation".to_string()));
        }
        Ok(rewritten.to_string())
    }
}
