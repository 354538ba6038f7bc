//! Telemetry for workflow runs
//!
//! Collects stage transitions, component calls, and degradations across
//! queries. Observational only: nothing here feeds back into a run.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::agent::{StageEvent, WorkflowStage};
use crate::budget::RetrySpend;

/// Reasoning or retrieval component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    Router,
    Retriever,
    Grader,
    Synthesizer,
    Checker,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Router => "router",
            Component::Retriever => "retriever",
            Component::Grader => "grader",
            Component::Synthesizer => "synthesizer",
            Component::Checker => "checker",
        }
    }
}

/// How a query ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryOutcome {
    Answered,
    Caveated,
    Cancelled,
    Failed,
}

/// Telemetry event types
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    QueryStarted {
        query_id: String,
        timestamp: Instant,
    },
    StageTransition {
        query_id: String,
        from: WorkflowStage,
        to: WorkflowStage,
        event: StageEvent,
        timestamp: Instant,
    },
    ComponentCall {
        query_id: String,
        component: Component,
        duration_ms: u64,
        success: bool,
        timestamp: Instant,
    },
    /// A component failure replaced by its safe default
    Degradation {
        query_id: String,
        component: Component,
        reason: String,
        timestamp: Instant,
    },
    RetryConsumed {
        query_id: String,
        edge: RetrySpend,
        remaining: usize,
        timestamp: Instant,
    },
    QueryFinished {
        query_id: String,
        outcome: QueryOutcome,
        iterations: usize,
        timestamp: Instant,
    },
}

/// Aggregate counts across queries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryStats {
    pub queries_run: usize,
    pub queries_answered: usize,
    pub queries_caveated: usize,
    pub queries_cancelled: usize,
    pub queries_failed: usize,
    pub stage_transitions: usize,
    pub component_calls: usize,
    pub component_failures: usize,
    pub degradations: usize,
    pub retries_consumed: usize,
}

/// Shared, cloneable event collector
#[derive(Clone)]
pub struct TelemetryCollector {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
    stats: Arc<Mutex<TelemetryStats>>,
    start_time: Instant,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            stats: Arc::new(Mutex::new(TelemetryStats::default())),
            start_time: Instant::now(),
        }
    }

    /// Record an event
    pub fn record(&self, event: TelemetryEvent) {
        {
            let mut stats = lock(&self.stats);
            match &event {
                TelemetryEvent::QueryStarted { .. } => stats.queries_run += 1,
                TelemetryEvent::StageTransition { .. } => stats.stage_transitions += 1,
                TelemetryEvent::ComponentCall { success, .. } => {
                    stats.component_calls += 1;
                    if !*success {
                        stats.component_failures += 1;
                    }
                }
                TelemetryEvent::Degradation { .. } => stats.degradations += 1,
                TelemetryEvent::RetryConsumed { .. } => stats.retries_consumed += 1,
                TelemetryEvent::QueryFinished { outcome, .. } => match outcome {
                    QueryOutcome::Answered => stats.queries_answered += 1,
                    QueryOutcome::Caveated => stats.queries_caveated += 1,
                    QueryOutcome::Cancelled => stats.queries_cancelled += 1,
                    QueryOutcome::Failed => stats.queries_failed += 1,
                },
            }
        }

        lock(&self.events).push(event);
    }

    pub fn get_stats(&self) -> TelemetryStats {
        lock(&self.stats).clone()
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    pub fn event_count(&self) -> usize {
        lock(&self.events).len()
    }

    /// Last `n` events
    pub fn recent_events(&self, n: usize) -> Vec<TelemetryEvent> {
        let events = lock(&self.events);
        let start = events.len().saturating_sub(n);
        events[start..].to_vec()
    }

    /// Share of component calls that succeeded
    pub fn component_success_rate(&self) -> f64 {
        let stats = lock(&self.stats);
        if stats.component_calls == 0 {
            1.0
        } else {
            (stats.component_calls - stats.component_failures) as f64 / stats.component_calls as f64
        }
    }

    /// Multi-line session summary
    pub fn summary(&self) -> String {
        let stats = self.get_stats();
        format!(
            "Session Summary\n\
             ─────────────────────────────────────\n\
             Duration:           {:?}\n\
             Queries:            {} ({} answered, {} caveated, {} cancelled, {} failed)\n\
             Component calls:    {} ({:.1}% succeeded)\n\
             Degradations:       {}\n\
             Retries consumed:   {}",
            self.elapsed(),
            stats.queries_run,
            stats.queries_answered,
            stats.queries_caveated,
            stats.queries_cancelled,
            stats.queries_failed,
            stats.component_calls,
            self.component_success_rate() * 100.0,
            stats.degradations,
            stats.retries_consumed,
        )
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(success: bool) -> TelemetryEvent {
        TelemetryEvent::ComponentCall {
            query_id: "q".to_string(),
            component: Component::Grader,
            duration_ms: 10,
            success,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn test_collector_creation() {
        let collector = TelemetryCollector::new();
        assert_eq!(collector.event_count(), 0);
        assert_eq!(collector.get_stats(), TelemetryStats::default());
        assert_eq!(collector.component_success_rate(), 1.0);
    }

    #[test]
    fn test_component_success_rate() {
        let collector = TelemetryCollector::new();
        collector.record(call(true));
        collector.record(call(true));
        collector.record(call(false));

        let stats = collector.get_stats();
        assert_eq!(stats.component_calls, 3);
        assert_eq!(stats.component_failures, 1);
        assert!((collector.component_success_rate() - 0.666).abs() < 0.01);
    }

    #[test]
    fn test_query_outcomes() {
        let collector = TelemetryCollector::new();
        for outcome in [
            QueryOutcome::Answered,
            QueryOutcome::Caveated,
            QueryOutcome::Caveated,
            QueryOutcome::Cancelled,
        ] {
            collector.record(TelemetryEvent::QueryFinished {
                query_id: "q".to_string(),
                outcome,
                iterations: 1,
                timestamp: Instant::now(),
            });
        }

        let stats = collector.get_stats();
        assert_eq!(stats.queries_answered, 1);
        assert_eq!(stats.queries_caveated, 2);
        assert_eq!(stats.queries_cancelled, 1);
        assert_eq!(stats.queries_failed, 0);
    }

    #[test]
    fn test_clones_share_events() {
        let collector = TelemetryCollector::new();
        let clone = collector.clone();
        clone.record(TelemetryEvent::RetryConsumed {
            query_id: "q".to_string(),
            edge: RetrySpend::Reformulation,
            remaining: 1,
            timestamp: Instant::now(),
        });
        assert_eq!(collector.get_stats().retries_consumed, 1);
    }

    #[test]
    fn test_recent_events() {
        let collector = TelemetryCollector::new();
        for _ in 0..10 {
            collector.record(call(true));
        }
        assert_eq!(collector.recent_events(3).len(), 3);
        assert!(collector.summary().contains("Component calls:    10"));
    }
}
