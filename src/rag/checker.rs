//! Groundedness checker

use std::sync::Arc;

use crate::errors::{RagError, Result};
use crate::llm::{CompletionOptions, ReasoningBackend};
use crate::rag::context::ContextBuilder;
use crate::rag::prompts;
use crate::types::{Draft, Groundedness, Passage};

/// Judges whether every material claim of a draft traces to the evidence
pub struct GroundednessChecker {
    backend: Arc<dyn ReasoningBackend>,
    options: CompletionOptions,
    context: ContextBuilder,
}

impl GroundednessChecker {
    pub fn new(backend: Arc<dyn ReasoningBackend>, options: CompletionOptions) -> Self {
        Self {
            backend,
            options,
            context: ContextBuilder::new(),
        }
    }

    /// GROUNDED or UNSUPPORTED; requires at least one accepted passage
    pub async fn check(&self, draft: &Draft, accepted: &[Passage]) -> Result<Groundedness> {
        if accepted.is_empty() {
            return Err(RagError::Check("No evidence to check against".to_string()));
        }

        let evidence = self.context.build(accepted);
        let prompt = prompts::check(&draft.text, &evidence.text);
        let reply = self
            .backend
            .complete(&prompt, &self.options)
            .await
            .map_err(|e| RagError::Check(e.to_string()))?;

        match prompts::parse_keyword(&reply, &["UNSUPPORTED", "GROUNDED"]) {
            Some("GROUNDED") => Ok(Groundedness::Grounded),
            Some(_) => Ok(Groundedness::Unsupported),
            None => Err(RagError::Check(format!("Unrecognized verdict: {}", reply.trim()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedBackend;
    use crate::rag::prompts::PromptKind;

    fn evidence() -> Vec<Passage> {
        vec![Passage::new("AEB scoring uses 12 points", "aeb.md#1", 0.8)]
    }

    #[tokio::test]
    async fn test_grounded_verdict() {
        let backend = Arc::new(ScriptedBackend::new().text(PromptKind::Check, "GROUNDED"));
        let checker = GroundednessChecker::new(backend.clone(), CompletionOptions::default());
        let draft = Draft::conditioned("12 points [aeb.md#1]", evidence());

        assert_eq!(checker.check(&draft, &evidence()).await.unwrap(), Groundedness::Grounded);
        assert!(backend.prompts(PromptKind::Check)[0].contains("12 points [aeb.md#1]"));
    }

    #[tokio::test]
    async fn test_unsupported_verdict() {
        let backend = Arc::new(ScriptedBackend::new().text(PromptKind::Check, "Unsupported: the 20 points claim"));
        let checker = GroundednessChecker::new(backend, CompletionOptions::default());
        let draft = Draft::conditioned("20 points", evidence());

        assert_eq!(
            checker.check(&draft, &evidence()).await.unwrap(),
            Groundedness::Unsupported
        );
    }

    #[tokio::test]
    async fn test_negated_verdict_is_not_grounded() {
        let backend = Arc::new(
            ScriptedBackend::new().text(PromptKind::Check, "Not grounded: the 20 points claim"),
        );
        let checker = GroundednessChecker::new(backend, CompletionOptions::default());
        let draft = Draft::conditioned("20 points", evidence());

        assert!(matches!(
            checker.check(&draft, &evidence()).await,
            Err(RagError::Check(_))
        ));
    }

    #[tokio::test]
    async fn test_requires_evidence() {
        let backend = Arc::new(ScriptedBackend::new());
        let checker = GroundednessChecker::new(backend.clone(), CompletionOptions::default());
        let result = checker.check(&Draft::direct("x"), &[]).await;
        assert!(matches!(result, Err(RagError::Check(_))));
        assert_eq!(backend.calls(PromptKind::Check), 0);
    }
}
