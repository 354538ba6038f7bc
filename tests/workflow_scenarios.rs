//! End-to-end workflow runs against a scripted backend and in-memory stores

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use agentrag::agent::{WorkflowOrchestrator, WorkflowStage};
use agentrag::config::{RoleModels, WorkflowConfig};
use agentrag::llm::{Reply, ScriptedBackend};
use agentrag::rag::PromptKind;
use agentrag::store::{DocumentChunk, DocumentStore, InMemoryStore, StoredChunk};
use agentrag::telemetry::TelemetryCollector;
use agentrag::types::{AnswerPath, Query};
use agentrag::RagError;

fn orchestrator_with(
    backend: ScriptedBackend,
    store: Arc<dyn DocumentStore>,
    config: WorkflowConfig,
) -> (Arc<ScriptedBackend>, WorkflowOrchestrator) {
    let backend = Arc::new(backend);
    let orchestrator =
        WorkflowOrchestrator::new(backend.clone(), store, config, RoleModels::default());
    (backend, orchestrator)
}

fn euro_ncap_store() -> Arc<dyn DocumentStore> {
    Arc::new(InMemoryStore::from_chunks(vec![
        DocumentChunk::new("aeb.md#0", "AEB car-to-car rear braking scenarios"),
        DocumentChunk::new("aeb.md#1", "AEB pedestrian scenarios and scoring"),
        DocumentChunk::new("vru.md#0", "Pedestrian protection by active bonnet"),
        DocumentChunk::new("lss.md#0", "Lane support systems and lane keeping assist"),
    ]))
}

/// Grades RELEVANT only for the listed source ids
fn relevant_sources(ids: &'static [&'static str]) -> Reply {
    Reply::judge(move |prompt| {
        if ids.iter().any(|id| prompt.contains(&format!("(source: {})", id))) {
            "RELEVANT".to_string()
        } else {
            "IRRELEVANT".to_string()
        }
    })
}

struct DownStore;

#[async_trait]
impl DocumentStore for DownStore {
    async fn search(&self, _query_text: &str, _k: usize) -> agentrag::Result<Vec<StoredChunk>> {
        Err(RagError::Store("connection refused".to_string()))
    }

    fn name(&self) -> &str {
        "down"
    }
}

#[tokio::test]
async fn test_empty_store_answers_with_low_confidence_caveat() {
    let (backend, orchestrator) = orchestrator_with(
        ScriptedBackend::new()
            .text(PromptKind::Route, "RETRIEVE")
            .text(PromptKind::Reformulate, "capital city of France")
            .text(PromptKind::Synthesize, "Paris"),
        Arc::new(InMemoryStore::new()),
        WorkflowConfig::default(),
    );

    let report = orchestrator
        .run(Query::new("What is the capital of France?"))
        .await
        .unwrap();

    assert_eq!(report.answer, "Paris");
    assert!(report.sources.is_empty());
    assert!(!report.grounded);
    assert!(report.caveat);
    assert!(report.low_confidence);
    assert_eq!(report.path, AnswerPath::Degraded);
    assert_eq!(report.iterations, 3);
    assert_eq!(backend.calls(PromptKind::Check), 0);
    assert_eq!(backend.calls(PromptKind::Grade), 0);
}

#[tokio::test]
async fn test_empty_store_routed_direct_is_still_caveated() {
    let (backend, orchestrator) = orchestrator_with(
        ScriptedBackend::new()
            .text(PromptKind::Route, "DIRECT")
            .text(PromptKind::Synthesize, "Paris"),
        Arc::new(InMemoryStore::new()),
        WorkflowConfig::default(),
    );

    let report = orchestrator
        .run(Query::new("What is the capital of France?"))
        .await
        .unwrap();

    assert_eq!(report.answer, "Paris");
    assert_eq!(report.path, AnswerPath::Direct);
    assert!(report.sources.is_empty());
    assert!(!report.grounded);
    assert!(report.caveat);
    assert_eq!(report.iterations, 0);
    assert_eq!(backend.calls(PromptKind::Check), 0);
}

#[tokio::test]
async fn test_two_relevant_passages_are_cited() {
    let (backend, orchestrator) = orchestrator_with(
        ScriptedBackend::new()
            .text(PromptKind::Route, "RETRIEVE")
            .reply(PromptKind::Grade, relevant_sources(&["aeb.md#0", "aeb.md#1"]))
            .text(
                PromptKind::Synthesize,
                "Rear braking [aeb.md#0] and pedestrian scoring [aeb.md#1].",
            )
            .text(PromptKind::Check, "GROUNDED"),
        euro_ncap_store(),
        WorkflowConfig::default(),
    );

    let report = orchestrator
        .run(Query::new("AEB scenarios and pedestrian scoring"))
        .await
        .unwrap();

    assert!(report.grounded);
    assert!(!report.caveat);
    assert_eq!(report.path, AnswerPath::Retrieval);
    assert_eq!(report.iterations, 1);
    // acceptance order follows retrieval rank
    assert_eq!(report.sources, vec!["aeb.md#1", "aeb.md#0"]);
    assert!(backend.calls(PromptKind::Grade) >= 3);

    let synthesis = &backend.prompts(PromptKind::Synthesize)[0];
    assert!(synthesis.contains("[aeb.md#0]"));
    assert!(synthesis.contains("[aeb.md#1]"));
    assert!(!synthesis.contains("[vru.md#0]"));
}

#[tokio::test]
async fn test_reformulated_query_finds_evidence_on_second_attempt() {
    let (backend, orchestrator) = orchestrator_with(
        ScriptedBackend::new()
            .text(PromptKind::Route, "RETRIEVE")
            .text(PromptKind::Reformulate, "pedestrian scoring protection")
            .text(PromptKind::Grade, "RELEVANT")
            .text(PromptKind::Synthesize, "See [aeb.md#1] and [vru.md#0].")
            .text(PromptKind::Check, "GROUNDED"),
        euro_ncap_store(),
        WorkflowConfig::default(),
    );

    let report = orchestrator
        .run(Query::new("How are pedestrians protected?"))
        .await
        .unwrap();

    assert_eq!(report.iterations, 2);
    assert_eq!(backend.calls(PromptKind::Reformulate), 1);
    assert_eq!(report.stage_after(WorkflowStage::Grading), Some(WorkflowStage::Reformulating));
    assert_eq!(report.sources, vec!["aeb.md#1", "vru.md#0"]);
    assert!(report.grounded);

    let synthesis = &backend.prompts(PromptKind::Synthesize)[0];
    assert!(synthesis.contains("[aeb.md#1]"));
    assert!(synthesis.contains("[vru.md#0]"));
    assert!(!synthesis.contains("[lss.md#0]"));

    let reformulation = &backend.prompts(PromptKind::Reformulate)[0];
    assert!(reformulation.contains("no relevant passages"));
}

#[tokio::test]
async fn test_unsupported_draft_is_returned_with_caveat() {
    let (backend, orchestrator) = orchestrator_with(
        ScriptedBackend::new()
            .text(PromptKind::Route, "RETRIEVE")
            .text(PromptKind::Grade, "RELEVANT")
            .text(PromptKind::Synthesize, "AEB prevents every collision [aeb.md#0].")
            .text(PromptKind::Check, "UNSUPPORTED"),
        euro_ncap_store(),
        WorkflowConfig::default(),
    );

    let report = orchestrator.run(Query::new("AEB rear braking")).await.unwrap();

    assert_eq!(report.answer, "AEB prevents every collision [aeb.md#0].");
    assert!(report.caveat);
    assert!(!report.grounded);
    assert_eq!(report.path, AnswerPath::Retrieval);
    assert_eq!(backend.calls(PromptKind::Synthesize), 3);
    assert_eq!(backend.calls(PromptKind::Check), 3);

    let prompts = backend.prompts(PromptKind::Synthesize);
    assert!(!prompts[0].contains("previous draft"));
    assert!(prompts[1].contains("previous draft"));
}

#[tokio::test]
async fn test_direct_route_skips_retrieval_and_checking() {
    let (backend, orchestrator) = orchestrator_with(
        ScriptedBackend::new()
            .text(PromptKind::Route, "DIRECT")
            .text(PromptKind::Synthesize, "4"),
        euro_ncap_store(),
        WorkflowConfig::default(),
    );

    let report = orchestrator.run(Query::new("What is 2+2?")).await.unwrap();

    assert_eq!(report.path, AnswerPath::Direct);
    assert!(report.caveat);
    assert!(!report.visited(WorkflowStage::Retrieving));
    assert!(!report.visited(WorkflowStage::Checking));
    assert_eq!(report.trace.last(), Some(&WorkflowStage::Done));
    assert_eq!(backend.calls(PromptKind::Check), 0);
}

#[tokio::test]
async fn test_all_irrelevant_goes_to_reformulation() {
    let (_backend, orchestrator) = orchestrator_with(
        ScriptedBackend::new()
            .text(PromptKind::Route, "RETRIEVE")
            .text(PromptKind::Reformulate, "AEB braking")
            .text(PromptKind::Grade, "IRRELEVANT")
            .text(PromptKind::Synthesize, "Not enough information."),
        euro_ncap_store(),
        WorkflowConfig::default(),
    );

    let report = orchestrator.run(Query::new("AEB braking")).await.unwrap();

    assert_eq!(report.stage_after(WorkflowStage::Grading), Some(WorkflowStage::Reformulating));
    assert_eq!(report.iterations, 3);
    assert!(report.low_confidence);
    assert!(report.caveat);
}

#[tokio::test]
async fn test_cancellation_mid_call_aborts_run() {
    let (_backend, orchestrator) = orchestrator_with(
        ScriptedBackend::new()
            .text(PromptKind::Route, "RETRIEVE")
            .text(PromptKind::Grade, "RELEVANT")
            .reply(PromptKind::Synthesize, Reply::Hang),
        euro_ncap_store(),
        WorkflowConfig::default(),
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let (result, _) = tokio::join!(
        orchestrator.run_with_cancel(Query::new("AEB braking"), cancel),
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        }
    );

    assert!(matches!(result, Err(RagError::Cancelled)));
}

#[tokio::test]
async fn test_cancelled_before_start_makes_no_calls() {
    let (backend, orchestrator) = orchestrator_with(
        ScriptedBackend::new().text(PromptKind::Route, "RETRIEVE"),
        euro_ncap_store(),
        WorkflowConfig::default(),
    );

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = orchestrator.run_with_cancel(Query::new("AEB"), cancel).await;

    assert!(matches!(result, Err(RagError::Cancelled)));
    assert_eq!(backend.calls(PromptKind::Route), 0);
}

#[tokio::test]
async fn test_timeouts_fall_back_to_component_defaults() {
    let config = WorkflowConfig {
        call_timeout_secs: 1,
        retry_budget: 0,
        max_iterations: 6,
        ..WorkflowConfig::default()
    };
    let (backend, orchestrator) = orchestrator_with(
        ScriptedBackend::new()
            .reply(PromptKind::Route, Reply::Hang)
            .text(PromptKind::Grade, "RELEVANT")
            .text(PromptKind::Synthesize, "Rear braking [aeb.md#0]")
            .reply(PromptKind::Check, Reply::Hang),
        euro_ncap_store(),
        config,
    );

    let report = orchestrator.run(Query::new("AEB rear braking")).await.unwrap();

    assert!(report.visited(WorkflowStage::Retrieving));
    assert!(!report.grounded);
    assert!(report.caveat);
    assert_eq!(report.answer, "Rear braking [aeb.md#0]");
    assert_eq!(backend.calls(PromptKind::Check), 1);
}

#[tokio::test]
async fn test_store_outage_with_synthesis_failure_is_workflow_failure() {
    let telemetry = TelemetryCollector::new();
    let (backend, orchestrator) = orchestrator_with(
        ScriptedBackend::new()
            .text(PromptKind::Route, "RETRIEVE")
            .text(PromptKind::Reformulate, "AEB")
            .failing(PromptKind::Synthesize, "model crashed"),
        Arc::new(DownStore),
        WorkflowConfig::default(),
    );
    let orchestrator = orchestrator.with_telemetry(telemetry.clone());

    let result = orchestrator.run(Query::new("AEB")).await;

    assert!(matches!(result, Err(RagError::WorkflowFailure(_))));
    assert_eq!(backend.calls(PromptKind::Reformulate), 2);
    assert_eq!(backend.calls(PromptKind::Synthesize), 1);
    assert_eq!(telemetry.get_stats().queries_failed, 1);
}

#[tokio::test]
async fn test_store_outage_still_answers_when_synthesis_works() {
    let (_backend, orchestrator) = orchestrator_with(
        ScriptedBackend::new()
            .text(PromptKind::Route, "RETRIEVE")
            .text(PromptKind::Reformulate, "AEB")
            .text(PromptKind::Synthesize, "AEB is automatic emergency braking."),
        Arc::new(DownStore),
        WorkflowConfig::default(),
    );

    let report = orchestrator.run(Query::new("AEB")).await.unwrap();

    assert_eq!(report.path, AnswerPath::Degraded);
    assert!(report.low_confidence);
    assert!(report.caveat);
}

#[tokio::test]
async fn test_concurrent_queries_are_independent() {
    let (_backend, orchestrator) = orchestrator_with(
        ScriptedBackend::new()
            .text(PromptKind::Route, "RETRIEVE")
            .reply(
                PromptKind::Grade,
                Reply::judge(|prompt| {
                    let lane = prompt.contains("Question: lane") && prompt.contains("lss.md");
                    let aeb = prompt.contains("Question: AEB") && prompt.contains("aeb.md");
                    let verdict = if lane || aeb { "RELEVANT" } else { "IRRELEVANT" };
                    verdict.to_string()
                }),
            )
            .reply(
                PromptKind::Synthesize,
                Reply::judge(|prompt| {
                    if prompt.contains("[lss.md#0]") {
                        "Lane keeping [lss.md#0]".to_string()
                    } else {
                        "Rear braking [aeb.md#0]".to_string()
                    }
                }),
            )
            .text(PromptKind::Check, "GROUNDED"),
        euro_ncap_store(),
        WorkflowConfig::default(),
    );
    let orchestrator = Arc::new(orchestrator);

    let a = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.run(Query::new("lane keeping assist")).await })
    };
    let b = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.run(Query::new("AEB rear braking")).await })
    };

    let lane = a.await.unwrap().unwrap();
    let aeb = b.await.unwrap().unwrap();

    assert_eq!(lane.sources, vec!["lss.md#0"]);
    assert_eq!(aeb.sources, vec!["aeb.md#0"]);
    assert!(lane.grounded && aeb.grounded);
}
