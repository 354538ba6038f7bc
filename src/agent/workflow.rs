//! Per-query workflow record
//!
//! Owned by one orchestrator run and dropped when it ends. Invariants:
//! - the accepted set holds only RELEVANT passages, one per source id
//! - `steps` never exceeds the transition cap; the capping transition is
//!   always the one into Done
//! - at most one draft is held; a finished run always yields exactly one

use crate::agent::state::{StageEvent, WorkflowStage};
use crate::budget::RetryBudget;
use crate::errors::Result;
use crate::types::{Draft, Groundedness, Passage, Query, RetrievalResult};

#[derive(Debug)]
pub struct WorkflowState {
    query: Query,
    search_text: String,
    stage: WorkflowStage,
    accepted: Vec<Passage>,
    pending: Option<RetrievalResult>,
    draft: Option<Draft>,
    budget: RetryBudget,
    /// Retrieval attempts started
    iteration: usize,
    failed_retrievals: usize,
    steps: usize,
    max_steps: usize,
    trace: Vec<WorkflowStage>,
    history: Vec<String>,
    routed_direct: bool,
    degraded: bool,
    fallback: bool,
    strict: bool,
    step_limited: bool,
}

impl WorkflowState {
    pub fn new(query: Query, retry_budget: usize, max_steps: usize) -> Self {
        let search_text = query.text.trim().to_string();
        Self {
            query,
            search_text,
            stage: WorkflowStage::Routing,
            accepted: Vec::new(),
            pending: None,
            draft: None,
            budget: RetryBudget::new(retry_budget),
            iteration: 0,
            failed_retrievals: 0,
            steps: 0,
            max_steps: max_steps.max(1),
            trace: vec![WorkflowStage::Routing],
            history: Vec::new(),
            routed_direct: false,
            degraded: false,
            fallback: false,
            strict: false,
            step_limited: false,
        }
    }

    /// Take one transition; the last step the cap allows is forced into Done
    pub fn advance(&mut self, event: StageEvent) -> Result<WorkflowStage> {
        let mut next = self.stage.transition(event)?;
        if !next.is_terminal() && self.steps + 1 >= self.max_steps {
            next = self.stage.transition(StageEvent::StepLimitReached)?;
            self.step_limited = true;
        }
        self.steps += 1;
        self.stage = next;
        self.trace.push(next);
        Ok(next)
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn stage(&self) -> WorkflowStage {
        self.stage
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }

    /// Text the store is searched with (the query, or its latest rewrite)
    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn set_search_text(&mut self, text: impl Into<String>) {
        self.search_text = text.into();
    }

    /// Start a retrieval attempt; returns its 1-based number
    pub fn begin_retrieval(&mut self) -> usize {
        self.iteration += 1;
        self.iteration
    }

    pub fn record_retrieval_failure(&mut self) {
        self.failed_retrievals += 1;
    }

    /// Every retrieval attempt so far failed to reach the store
    pub fn store_outage(&self) -> bool {
        self.iteration > 0 && self.failed_retrievals == self.iteration
    }

    pub fn set_pending(&mut self, result: RetrievalResult) {
        self.pending = Some(result);
    }

    pub fn take_pending(&mut self) -> Option<RetrievalResult> {
        self.pending.take()
    }

    /// Add relevant passages to the accepted set; returns how many were new
    pub fn accept(&mut self, passages: impl IntoIterator<Item = Passage>) -> usize {
        let before = self.accepted.len();
        for passage in passages.into_iter().filter(|p| p.is_relevant()) {
            if !self
                .accepted
                .iter()
                .any(|a| a.source_id() == passage.source_id())
            {
                self.accepted.push(passage);
            }
        }
        self.accepted.len() - before
    }

    pub fn accepted(&self) -> &[Passage] {
        &self.accepted
    }

    pub fn draft(&self) -> Option<&Draft> {
        self.draft.as_ref()
    }

    /// Replace the held draft
    pub fn set_draft(&mut self, draft: Draft) {
        self.draft = Some(draft);
    }

    pub fn set_groundedness(&mut self, verdict: Groundedness) {
        if let Some(draft) = self.draft.as_mut() {
            draft.groundedness = verdict;
        }
    }

    /// Final draft, falling back when none was produced
    pub fn take_final_draft(&mut self) -> Draft {
        match self.draft.take() {
            Some(draft) => draft,
            None => {
                self.fallback = true;
                Draft::fallback(&self.query.text)
            }
        }
    }

    pub fn budget(&self) -> &RetryBudget {
        &self.budget
    }

    pub fn budget_mut(&mut self) -> &mut RetryBudget {
        &mut self.budget
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn trace(&self) -> &[WorkflowStage] {
        &self.trace
    }

    /// Notes from earlier attempts, shown to the router
    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn note(&mut self, entry: impl Into<String>) {
        self.history.push(entry.into());
    }

    pub fn mark_direct(&mut self) {
        self.routed_direct = true;
    }

    pub fn routed_direct(&self) -> bool {
        self.routed_direct
    }

    /// Retrieval produced no usable evidence; answering without it
    pub fn mark_degraded(&mut self) {
        self.degraded = true;
    }

    pub fn degraded(&self) -> bool {
        self.degraded
    }

    pub fn mark_fallback(&mut self) {
        self.fallback = true;
    }

    pub fn fallback(&self) -> bool {
        self.fallback
    }

    pub fn set_strict(&mut self) {
        self.strict = true;
    }

    pub fn strict(&self) -> bool {
        self.strict
    }

    pub fn step_limited(&self) -> bool {
        self.step_limited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RelevanceVerdict;

    fn graded(source_id: &str, verdict: RelevanceVerdict) -> Passage {
        let mut passage = Passage::new(format!("text {}", source_id), source_id, 0.5);
        passage.assign_verdict(verdict);
        passage
    }

    #[test]
    fn test_initial_state() {
        let state = WorkflowState::new(Query::new("  What is AEB? "), 2, 16);
        assert_eq!(state.stage(), WorkflowStage::Routing);
        assert_eq!(state.iteration(), 0);
        assert_eq!(state.budget().remaining(), 2);
        assert_eq!(state.search_text(), "What is AEB?");
        assert_eq!(state.trace(), &[WorkflowStage::Routing]);
    }

    #[test]
    fn test_accept_filters_and_dedupes() {
        let mut state = WorkflowState::new(Query::new("q"), 2, 16);
        let added = state.accept(vec![
            graded("a", RelevanceVerdict::Relevant),
            graded("b", RelevanceVerdict::Irrelevant),
            graded("a", RelevanceVerdict::Relevant),
            graded("c", RelevanceVerdict::Unset),
        ]);
        assert_eq!(added, 1);
        assert_eq!(state.accepted().len(), 1);
        assert!(state.accepted().iter().all(|p| p.is_relevant()));

        assert_eq!(state.accept(vec![graded("a", RelevanceVerdict::Relevant)]), 0);
    }

    #[test]
    fn test_step_cap_forces_done() {
        let mut state = WorkflowState::new(Query::new("q"), 2, 3);
        state.advance(StageEvent::RouteRetrieve).unwrap();
        state.advance(StageEvent::PassagesRetrieved).unwrap();
        let last = state.advance(StageEvent::EvidenceRejected).unwrap();

        assert_eq!(last, WorkflowStage::Done);
        assert!(state.step_limited());
        assert_eq!(state.steps(), 3);
    }

    #[test]
    fn test_invalid_event_leaves_state_untouched() {
        let mut state = WorkflowState::new(Query::new("q"), 2, 16);
        assert!(state.advance(StageEvent::Grounded).is_err());
        assert_eq!(state.stage(), WorkflowStage::Routing);
        assert_eq!(state.steps(), 0);
    }

    #[test]
    fn test_store_outage_tracks_every_attempt() {
        let mut state = WorkflowState::new(Query::new("q"), 2, 16);
        assert!(!state.store_outage());

        state.begin_retrieval();
        state.record_retrieval_failure();
        assert!(state.store_outage());

        state.begin_retrieval();
        assert!(!state.store_outage());
    }

    #[test]
    fn test_missing_draft_becomes_fallback() {
        let mut state = WorkflowState::new(Query::new("capital of France"), 0, 16);
        let draft = state.take_final_draft();
        assert!(draft.text.contains("could not be produced"));
        assert!(state.fallback());
    }
}
