//! Evidence block assembly for synthesis and checking prompts
use serde::{Deserialize, Serialize};

use crate::types::Passage;

/// Evidence assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Maximum estimated tokens of passage text; the first passage is always kept
    pub max_context_tokens: usize,
    /// Append store metadata (file name, version, ...) after the source id
    pub include_metadata: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: 6000,
            include_metadata: true,
        }
    }
}

/// Formatted evidence ready to drop into a prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledContext {
    pub text: String,
    pub passage_count: usize,
    pub estimated_tokens: usize,
    pub source_ids: Vec<String>,
}

/// Builds the `[source_id] content` evidence block
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    config: ContextConfig,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Self { config }
    }

    pub fn build(&self, passages: &[Passage]) -> AssembledContext {
        let mut parts = Vec::with_capacity(passages.len());
        let mut total_tokens = 0;
        let mut source_ids = Vec::with_capacity(passages.len());

        for passage in passages {
            // ~4 chars per token
            let tokens = passage.content().len() / 4;
            if !parts.is_empty() && total_tokens + tokens > self.config.max_context_tokens {
                break;
            }

            parts.push(self.format_passage(passage));
            total_tokens += tokens;
            source_ids.push(passage.source_id().to_string());
        }

        AssembledContext {
            text: parts.join("\n\n"),
            passage_count: parts.len(),
            estimated_tokens: total_tokens,
            source_ids,
        }
    }

    fn format_passage(&self, passage: &Passage) -> String {
        let details = if self.config.include_metadata {
            passage
                .metadata()
                .iter()
                .filter_map(|(k, v)| match v {
                    serde_json::Value::String(s) => Some(format!("{}: {}", k, s)),
                    serde_json::Value::Number(n) => Some(format!("{}: {}", k, n)),
                    serde_json::Value::Bool(b) => Some(format!("{}: {}", k, b)),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(", ")
        } else {
            String::new()
        };

        if details.is_empty() {
            format!("[{}]\n{}", passage.source_id(), passage.content())
        } else {
            format!("[{}] ({})\n{}", passage.source_id(), details, passage.content())
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_empty() {
        let context = ContextBuilder::new().build(&[]);
        assert_eq!(context.passage_count, 0);
        assert!(context.text.is_empty());
    }

    #[test]
    fn test_passages_are_labelled_by_source() {
        let mut metadata = serde_json::Map::new();
        metadata.insert("file_name".to_string(), "aeb.md".into());
        let passages = vec![
            Passage::new("AEB scoring", "aeb.md#1", 0.9).with_metadata(metadata),
            Passage::new("Lane support", "lss.md#0", 0.5),
        ];

        let context = ContextBuilder::new().build(&passages);
        assert_eq!(context.passage_count, 2);
        assert!(context.text.contains("[aeb.md#1] (file_name: aeb.md)\nAEB scoring"));
        assert!(context.text.contains("[lss.md#0]\nLane support"));
        assert_eq!(context.source_ids, vec!["aeb.md#1", "lss.md#0"]);
    }

    #[test]
    fn test_token_limit_keeps_first_passage() {
        let builder = ContextBuilder::with_config(ContextConfig {
            max_context_tokens: 2,
            include_metadata: false,
        });
        let passages = vec![
            Passage::new("a fairly long first passage", "a", 0.9),
            Passage::new("second", "b", 0.8),
        ];

        let context = builder.build(&passages);
        assert_eq!(context.passage_count, 1);
        assert_eq!(context.source_ids, vec!["a"]);
    }
}
