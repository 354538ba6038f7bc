//! Relevance grader
//!
//! Binary per-passage verdicts. Passages are graded concurrently through a
//! semaphore-bounded fan-out; the join is the barrier before grading ends.
//! A failed or timed-out grading call leaves the passage IRRELEVANT.

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::{RagError, Result};
use crate::llm::{CompletionOptions, ReasoningBackend};
use crate::rag::guard::guarded;
use crate::rag::prompts;
use crate::types::{RelevanceVerdict, RetrievalResult};

/// Outcome of grading one retrieval result
#[derive(Debug, Clone)]
pub struct GradingReport {
    /// The graded passages; every verdict is set
    pub result: RetrievalResult,
    /// Calls that failed or timed out and defaulted to IRRELEVANT
    pub failures: usize,
    /// Per-passage flag, in passage order, set where the call failed
    pub failed: Vec<bool>,
}

impl GradingReport {
    pub fn relevant_count(&self) -> usize {
        self.result.relevant().count()
    }

    /// Whether the grading call for the passage at `index` succeeded
    pub fn succeeded(&self, index: usize) -> bool {
        !self.failed.get(index).copied().unwrap_or(false)
    }
}

/// Per-passage relevance classifier
pub struct RelevanceGrader {
    backend: Arc<dyn ReasoningBackend>,
    options: CompletionOptions,
    concurrency: usize,
    call_timeout: Duration,
}

impl RelevanceGrader {
    pub fn new(backend: Arc<dyn ReasoningBackend>, options: CompletionOptions) -> Self {
        Self {
            backend,
            options,
            concurrency: 4,
            call_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Grade a single passage
    pub async fn grade(&self, query_text: &str, source_id: &str, content: &str) -> Result<RelevanceVerdict> {
        let prompt = prompts::grade(query_text, source_id, content);
        let reply = self
            .backend
            .complete(&prompt, &self.options)
            .await
            .map_err(|e| RagError::Grading(e.to_string()))?;

        match prompts::parse_keyword(&reply, &["IRRELEVANT", "RELEVANT"]) {
            Some("RELEVANT") => Ok(RelevanceVerdict::Relevant),
            Some(_) => Ok(RelevanceVerdict::Irrelevant),
            None => Err(RagError::Grading(format!("Unrecognized verdict: {}", reply.trim()))),
        }
    }

    /// Grade every passage; only cancellation is an error
    pub async fn grade_all(
        &self,
        query_text: &str,
        mut result: RetrievalResult,
        cancel: &CancellationToken,
    ) -> Result<GradingReport> {
        let permits = Arc::new(Semaphore::new(self.concurrency));

        let calls = result.passages.iter().map(|passage| {
            let permits = Arc::clone(&permits);
            async move {
                let _permit = permits
                    .acquire()
                    .await
                    .map_err(|e| RagError::Grading(e.to_string()))?;
                guarded(
                    "grader",
                    self.call_timeout,
                    cancel,
                    self.grade(query_text, passage.source_id(), passage.content()),
                )
                .await
            }
        });
        let outcomes = join_all(calls).await;

        if cancel.is_cancelled() || outcomes.iter().any(|o| matches!(o, Err(RagError::Cancelled))) {
            return Err(RagError::Cancelled);
        }

        let mut failed = Vec::with_capacity(outcomes.len());
        for (passage, outcome) in result.passages.iter_mut().zip(outcomes) {
            let verdict = match outcome {
                Ok(verdict) => verdict,
                Err(e) => {
                    warn!(source = passage.source_id(), error = %e, "grading failed; passage treated as irrelevant");
                    failed.push(true);
                    passage.assign_verdict(RelevanceVerdict::Irrelevant);
                    continue;
                }
            };
            failed.push(false);
            passage.assign_verdict(verdict);
        }
        let failures = failed.iter().filter(|f| **f).count();

        let report = GradingReport { result, failures, failed };
        debug!(
            graded = report.result.len(),
            relevant = report.relevant_count(),
            failures,
            "grading complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Reply, ScriptedBackend};
    use crate::rag::prompts::PromptKind;
    use crate::types::Passage;

    fn passages(ids: &[&str]) -> RetrievalResult {
        RetrievalResult::new(
            "q",
            ids.iter()
                .map(|id| Passage::new(format!("content of {}", id), *id, 0.5))
                .collect(),
        )
    }

    fn keep_only(source: &'static str) -> Reply {
        Reply::judge(move |prompt| {
            if prompt.contains(&format!("source: {})", source)) {
                "RELEVANT".to_string()
            } else {
                "IRRELEVANT".to_string()
            }
        })
    }

    #[tokio::test]
    async fn test_grades_each_passage_independently() {
        let backend = Arc::new(ScriptedBackend::new().reply(PromptKind::Grade, keep_only("b")));
        let grader = RelevanceGrader::new(backend.clone(), CompletionOptions::default());

        let report = grader
            .grade_all("q", passages(&["a", "b", "c"]), &CancellationToken::new())
            .await
            .unwrap();

        let relevant: Vec<_> = report.result.relevant().map(|p| p.source_id()).collect();
        assert_eq!(relevant, vec!["b"]);
        assert_eq!(report.failures, 0);
        assert_eq!(backend.calls(PromptKind::Grade), 3);
        assert!(report
            .result
            .passages
            .iter()
            .all(|p| p.verdict() != RelevanceVerdict::Unset));
    }

    #[tokio::test]
    async fn test_failed_call_defaults_to_irrelevant() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .sequence(PromptKind::Grade, [Reply::Fail("boom".to_string())])
                .text(PromptKind::Grade, "RELEVANT"),
        );
        let grader = RelevanceGrader::new(backend, CompletionOptions::default()).with_concurrency(1);

        let report = grader
            .grade_all("q", passages(&["a", "b"]), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.failures, 1);
        assert_eq!(report.relevant_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_flags_follow_passage_order() {
        let backend = Arc::new(ScriptedBackend::new().reply(
            PromptKind::Grade,
            Reply::judge(|prompt| {
                if prompt.contains("source: b)") {
                    "overloaded".to_string()
                } else {
                    "RELEVANT".to_string()
                }
            }),
        ));
        let grader = RelevanceGrader::new(backend, CompletionOptions::default());

        let report = grader
            .grade_all("q", passages(&["a", "b", "c"]), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.failed, vec![false, true, false]);
        assert!(report.succeeded(0));
        assert!(!report.succeeded(1));
        assert!(report.succeeded(2));
        assert_eq!(report.failures, 1);
    }

    #[tokio::test]
    async fn test_negated_reply_leaves_passage_irrelevant() {
        let backend = Arc::new(ScriptedBackend::new().text(PromptKind::Grade, "Not relevant."));
        let grader = RelevanceGrader::new(backend, CompletionOptions::default());

        assert!(matches!(
            grader.grade("q", "a", "text").await,
            Err(RagError::Grading(_))
        ));

        let report = grader
            .grade_all("q", passages(&["a", "b"]), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.relevant_count(), 0);
        assert_eq!(report.failed, vec![true, true]);
    }

    #[tokio::test]
    async fn test_timeout_defaults_to_irrelevant() {
        let backend = Arc::new(ScriptedBackend::new().reply(PromptKind::Grade, Reply::Hang));
        let grader = RelevanceGrader::new(backend, CompletionOptions::default())
            .with_timeout(Duration::from_millis(20));

        let report = grader
            .grade_all("q", passages(&["a", "b"]), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.failures, 2);
        assert_eq!(report.relevant_count(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_aborts_grading() {
        let backend = Arc::new(ScriptedBackend::new().reply(PromptKind::Grade, Reply::Hang));
        let grader = RelevanceGrader::new(backend, CompletionOptions::default());
        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let result = grader.grade_all("q", passages(&["a"]), &token).await;
        assert!(matches!(result, Err(RagError::Cancelled)));
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_failure() {
        let backend = Arc::new(ScriptedBackend::new().text(PromptKind::Grade, "perhaps"));
        let grader = RelevanceGrader::new(backend, CompletionOptions::default());
        let verdict = grader.grade("q", "a", "text").await;
        assert!(matches!(verdict, Err(RagError::Grading(_))));
    }
}
