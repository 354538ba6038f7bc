//! Workflow orchestrator - main coordinator
//!
//! Drives one query through the stage machine:
//! - Routing decides between direct reasoning and retrieval
//! - Retrieval, grading, and reformulation loop on the shared retry budget
//! - Synthesis and the groundedness check may loop on the same budget
//!
//! Every component failure is replaced by that component's safe default and
//! logged at `warn`. A run ends with an `AnswerReport`, or with `Cancelled`,
//! or with `WorkflowFailure` when the store was down on every attempt and no
//! draft could be synthesized.

use std::future::Future;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use std::sync::Arc;

use crate::agent::router::{QueryRouter, RouteDecision};
use crate::agent::state::{StageEvent, WorkflowStage};
use crate::agent::workflow::WorkflowState;
use crate::budget::RetrySpend;
use crate::config::{RoleModels, WorkflowConfig};
use crate::errors::{RagError, Result};
use crate::llm::ReasoningBackend;
use crate::rag::{
    cited_sources, guarded, AnswerSynthesizer, GradingReport, GroundednessChecker,
    RelevanceGrader, Retriever,
};
use crate::store::DocumentStore;
use crate::telemetry::{Component, QueryOutcome, TelemetryCollector, TelemetryEvent};
use crate::types::{AnswerPath, AnswerReport, Groundedness, Query, RetrievalResult};

/// Per-run identity and cancellation
struct Run<'a> {
    id: String,
    cancel: &'a CancellationToken,
}

/// Main workflow orchestrator
pub struct WorkflowOrchestrator {
    router: QueryRouter,
    retriever: Retriever,
    grader: RelevanceGrader,
    synthesizer: AnswerSynthesizer,
    checker: GroundednessChecker,
    config: WorkflowConfig,
    telemetry: Option<TelemetryCollector>,
}

impl WorkflowOrchestrator {
    /// Build every component from one backend and one store
    pub fn new(
        backend: Arc<dyn ReasoningBackend>,
        store: Arc<dyn DocumentStore>,
        config: WorkflowConfig,
        models: RoleModels,
    ) -> Self {
        let router = QueryRouter::new(Arc::clone(&backend), models.router);
        let retriever = Retriever::new(store).with_overfetch(config.overfetch);
        let grader = RelevanceGrader::new(Arc::clone(&backend), models.grader)
            .with_concurrency(config.grading_concurrency)
            .with_timeout(config.call_timeout());
        let synthesizer = AnswerSynthesizer::new(Arc::clone(&backend), models.synthesizer);
        let checker = GroundednessChecker::new(backend, models.checker);

        Self {
            router,
            retriever,
            grader,
            synthesizer,
            checker,
            config,
            telemetry: None,
        }
    }

    pub fn with_router(mut self, router: QueryRouter) -> Self {
        self.router = router;
        self
    }

    pub fn with_retriever(mut self, retriever: Retriever) -> Self {
        self.retriever = retriever;
        self
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryCollector) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Answer a query
    pub async fn run(&self, query: Query) -> Result<AnswerReport> {
        self.run_with_cancel(query, CancellationToken::new()).await
    }

    /// Answer a query, aborting with `Cancelled` once `cancel` fires
    #[instrument(skip_all, fields(query = %query.text, session = ?query.session_id))]
    pub async fn run_with_cancel(
        &self,
        query: Query,
        cancel: CancellationToken,
    ) -> Result<AnswerReport> {
        let run = Run {
            id: Uuid::new_v4().to_string(),
            cancel: &cancel,
        };
        self.emit(TelemetryEvent::QueryStarted {
            query_id: run.id.clone(),
            timestamp: Instant::now(),
        });

        if query.text.trim().is_empty() {
            self.finish_telemetry(&run, QueryOutcome::Failed, 0);
            return Err(RagError::WorkflowFailure("Query text is empty".to_string()));
        }

        let mut state = WorkflowState::new(query, self.config.retry_budget, self.config.max_iterations);

        match self.drive(&run, &mut state).await {
            Ok(()) => {
                let report = Self::finish(state);
                let outcome = if report.caveat {
                    QueryOutcome::Caveated
                } else {
                    QueryOutcome::Answered
                };
                self.finish_telemetry(&run, outcome, report.iterations);
                info!(
                    path = ?report.path,
                    grounded = report.grounded,
                    caveat = report.caveat,
                    iterations = report.iterations,
                    sources = report.sources.len(),
                    "query answered"
                );
                Ok(report)
            }
            Err(e) => {
                let outcome = if e.is_cancelled() {
                    info!(stage = ?state.stage(), "query cancelled");
                    QueryOutcome::Cancelled
                } else {
                    warn!(error = %e, "query failed");
                    QueryOutcome::Failed
                };
                self.finish_telemetry(&run, outcome, state.iteration());
                Err(e)
            }
        }
    }

    async fn drive(&self, run: &Run<'_>, state: &mut WorkflowState) -> Result<()> {
        while !state.is_terminal() {
            if run.cancel.is_cancelled() {
                return Err(RagError::Cancelled);
            }

            let event = match state.stage() {
                WorkflowStage::Routing => self.route(run, state).await?,
                WorkflowStage::Retrieving => self.retrieve(run, state).await?,
                WorkflowStage::Grading => self.grade(run, state).await?,
                WorkflowStage::Reformulating => self.reformulate(run, state).await?,
                WorkflowStage::Synthesizing => self.synthesize(run, state).await?,
                WorkflowStage::Checking => self.check(run, state).await?,
                WorkflowStage::Done => break,
            };

            let from = state.stage();
            let was_limited = state.step_limited();
            let to = state.advance(event)?;
            if state.step_limited() && !was_limited {
                warn!(
                    from = ?from,
                    steps = state.steps(),
                    max = state.max_steps(),
                    "transition cap reached; finishing with caveat"
                );
            }
            debug!(from = ?from, to = ?to, event = ?event, step = state.steps(), "stage transition");
            self.emit(TelemetryEvent::StageTransition {
                query_id: run.id.clone(),
                from,
                to,
                event,
                timestamp: Instant::now(),
            });
        }
        Ok(())
    }

    async fn route(&self, run: &Run<'_>, state: &mut WorkflowState) -> Result<StageEvent> {
        let decision = self
            .call(
                run,
                Component::Router,
                self.router.route(&state.query().text, state.history()),
            )
            .await;

        match decision {
            Ok(RouteDecision::Direct) => {
                state.mark_direct();
                Ok(StageEvent::RouteDirect)
            }
            Ok(RouteDecision::Retrieve) => Ok(StageEvent::RouteRetrieve),
            Ok(RouteDecision::Reformulate) => {
                debug!("nothing retrieved yet; searching with the original text");
                Ok(StageEvent::RouteRetrieve)
            }
            Err(RagError::Cancelled) => Err(RagError::Cancelled),
            Err(e) => {
                warn!(error = %e, "routing failed; defaulting to retrieval");
                self.degraded(run, Component::Router, &e);
                Ok(StageEvent::RouteRetrieve)
            }
        }
    }

    async fn retrieve(&self, run: &Run<'_>, state: &mut WorkflowState) -> Result<StageEvent> {
        let attempt = state.begin_retrieval();
        let search_text = state.search_text().to_string();

        let result = self
            .call(
                run,
                Component::Retriever,
                self.retriever.retrieve_scoped(
                    &search_text,
                    self.config.top_k,
                    state.query().filter.as_ref(),
                ),
            )
            .await;

        let result = match result {
            Ok(result) => result,
            Err(RagError::Cancelled) => return Err(RagError::Cancelled),
            Err(e) => {
                warn!(attempt, error = %e, "retrieval failed; continuing with no passages");
                self.degraded(run, Component::Retriever, &e);
                state.record_retrieval_failure();
                RetrievalResult::empty(search_text)
            }
        };

        debug!(attempt, passages = result.len(), "passages retrieved");
        state.set_pending(result);
        Ok(StageEvent::PassagesRetrieved)
    }

    async fn grade(&self, run: &Run<'_>, state: &mut WorkflowState) -> Result<StageEvent> {
        let result = state
            .take_pending()
            .unwrap_or_else(|| RetrievalResult::empty(state.search_text()));
        let searched = result.query_text.clone();

        let report = if result.is_empty() {
            GradingReport {
                result,
                failures: 0,
                failed: Vec::new(),
            }
        } else {
            let started = Instant::now();
            let graded = self.grader.grade_all(&state.query().text, result, run.cancel).await?;
            let duration_ms = started.elapsed().as_millis() as u64;
            for failed in &graded.failed {
                self.emit(TelemetryEvent::ComponentCall {
                    query_id: run.id.clone(),
                    component: Component::Grader,
                    duration_ms,
                    success: !failed,
                    timestamp: Instant::now(),
                });
            }
            if graded.failures > 0 {
                self.emit(TelemetryEvent::Degradation {
                    query_id: run.id.clone(),
                    component: Component::Grader,
                    reason: format!("{} passage(s) defaulted to irrelevant", graded.failures),
                    timestamp: Instant::now(),
                });
            }
            graded
        };

        if report.relevant_count() > 0 {
            let added = state.accept(report.result.passages);
            debug!(added, accepted = state.accepted().len(), "evidence accepted");
            return Ok(StageEvent::EvidenceAccepted);
        }

        state.note(format!(
            "attempt {}: no relevant passages for \"{}\"",
            state.iteration(),
            searched
        ));
        if self.spend(run, state, RetrySpend::Reformulation) {
            Ok(StageEvent::EvidenceRejected)
        } else {
            warn!(
                attempts = state.iteration(),
                "no relevant evidence and retry budget exhausted; answering without evidence"
            );
            state.mark_degraded();
            Ok(StageEvent::EvidenceExhausted)
        }
    }

    async fn reformulate(&self, run: &Run<'_>, state: &mut WorkflowState) -> Result<StageEvent> {
        let rewritten = self
            .call(
                run,
                Component::Router,
                self.router
                    .reformulate(&state.query().text, state.search_text(), state.history()),
            )
            .await;

        match rewritten {
            Ok(text) => {
                debug!(from = state.search_text(), to = %text, "query reformulated");
                state.set_search_text(text);
            }
            Err(RagError::Cancelled) => return Err(RagError::Cancelled),
            Err(e) => {
                warn!(error = %e, "reformulation failed; keeping previous search text");
                self.degraded(run, Component::Router, &e);
            }
        }
        Ok(StageEvent::QueryRewritten)
    }

    async fn synthesize(&self, run: &Run<'_>, state: &mut WorkflowState) -> Result<StageEvent> {
        let accepted = state.accepted().to_vec();
        let drafted = self
            .call(
                run,
                Component::Synthesizer,
                self.synthesizer
                    .synthesize(&state.query().text, &accepted, state.strict()),
            )
            .await;

        match drafted {
            Ok(draft) => {
                let needs_check = draft.needs_check();
                state.set_draft(draft);
                Ok(if needs_check {
                    StageEvent::DraftForChecking
                } else {
                    StageEvent::DraftFinal
                })
            }
            Err(RagError::Cancelled) => Err(RagError::Cancelled),
            Err(e) => {
                self.degraded(run, Component::Synthesizer, &e);
                if self.spend(run, state, RetrySpend::SynthesisRetry) {
                    warn!(error = %e, "synthesis failed; retrying");
                    return Ok(StageEvent::SynthesisRetry);
                }
                if state.draft().is_none() && state.store_outage() {
                    return Err(RagError::WorkflowFailure(format!(
                        "document store unavailable on all {} retrieval attempt(s) and synthesis failed: {}",
                        state.iteration(),
                        e
                    )));
                }
                warn!(error = %e, "synthesis failed with no retry budget; returning best-effort draft");
                if state.draft().is_none() {
                    state.mark_fallback();
                }
                Ok(StageEvent::SynthesisAbandoned)
            }
        }
    }

    async fn check(&self, run: &Run<'_>, state: &mut WorkflowState) -> Result<StageEvent> {
        let verdict = match state.draft() {
            Some(draft) => {
                self.call(
                    run,
                    Component::Checker,
                    self.checker.check(draft, state.accepted()),
                )
                .await
            }
            None => Err(RagError::Check("No draft to check".to_string())),
        };

        match verdict {
            Ok(Groundedness::Grounded) => {
                state.set_groundedness(Groundedness::Grounded);
                return Ok(StageEvent::Grounded);
            }
            Ok(_) => {}
            Err(RagError::Cancelled) => return Err(RagError::Cancelled),
            Err(e) => {
                warn!(error = %e, "groundedness check failed; treating draft as unsupported");
                self.degraded(run, Component::Checker, &e);
            }
        }

        state.set_groundedness(Groundedness::Unsupported);
        if self.spend(run, state, RetrySpend::Resynthesis) {
            warn!("draft unsupported by evidence; re-synthesizing with stricter instructions");
            state.set_strict();
            Ok(StageEvent::Unsupported)
        } else {
            warn!("draft unsupported by evidence and retry budget exhausted; returning with caveat");
            Ok(StageEvent::UnsupportedFinal)
        }
    }

    fn finish(mut state: WorkflowState) -> AnswerReport {
        let draft = state.take_final_draft();

        let path = if state.fallback() {
            AnswerPath::Fallback
        } else if state.routed_direct() {
            AnswerPath::Direct
        } else if draft.passages.is_empty() {
            AnswerPath::Degraded
        } else {
            AnswerPath::Retrieval
        };

        let grounded = draft.is_grounded();
        // only a checked, grounded retrieval draft goes out without a caveat
        let caveat = state.step_limited()
            || match path {
                AnswerPath::Retrieval => !grounded,
                AnswerPath::Direct | AnswerPath::Degraded | AnswerPath::Fallback => true,
            };
        let sources = match path {
            AnswerPath::Retrieval => cited_sources(&draft.text, &draft.passages),
            _ => Vec::new(),
        };

        AnswerReport {
            answer: draft.text,
            sources,
            grounded,
            caveat,
            iterations: state.iteration(),
            low_confidence: state.degraded() || path == AnswerPath::Degraded,
            path,
            trace: state.trace().to_vec(),
        }
    }

    /// One external call under the per-call timeout and the run's cancellation
    async fn call<T, F>(&self, run: &Run<'_>, component: Component, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let outcome = guarded(
            component.as_str(),
            self.config.call_timeout(),
            run.cancel,
            fut,
        )
        .await;

        if !matches!(outcome, Err(RagError::Cancelled)) {
            self.emit(TelemetryEvent::ComponentCall {
                query_id: run.id.clone(),
                component,
                duration_ms: started.elapsed().as_millis() as u64,
                success: outcome.is_ok(),
                timestamp: Instant::now(),
            });
        }
        outcome
    }

    fn spend(&self, run: &Run<'_>, state: &mut WorkflowState, edge: RetrySpend) -> bool {
        if !state.budget_mut().try_consume(edge) {
            return false;
        }
        self.emit(TelemetryEvent::RetryConsumed {
            query_id: run.id.clone(),
            edge,
            remaining: state.budget().remaining(),
            timestamp: Instant::now(),
        });
        if let Some(warning) = state.budget_mut().check_warning() {
            debug!(?warning, "retry budget");
        }
        true
    }

    fn degraded(&self, run: &Run<'_>, component: Component, error: &RagError) {
        self.emit(TelemetryEvent::Degradation {
            query_id: run.id.clone(),
            component,
            reason: error.to_string(),
            timestamp: Instant::now(),
        });
    }

    fn finish_telemetry(&self, run: &Run<'_>, outcome: QueryOutcome, iterations: usize) {
        self.emit(TelemetryEvent::QueryFinished {
            query_id: run.id.clone(),
            outcome,
            iterations,
            timestamp: Instant::now(),
        });
    }

    fn emit(&self, event: TelemetryEvent) {
        if let Some(telemetry) = &self.telemetry {
            telemetry.record(event);
        }
    }
}
