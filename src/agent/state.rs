//! Workflow stage machine
//!
//! A deterministic finite state machine over the workflow stages:
//! - Safety: only edges listed in the table are taken; anything else is an error
//! - Determinism: unique next stage per (stage, event)
//! - Termination: every stage reaches Done on `StepLimitReached`; Done only loops

use crate::errors::{RagError, Result};
use serde::{Deserialize, Serialize};

/// Workflow stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowStage {
    /// Initial stage - deciding whether retrieval is needed
    Routing,

    /// Searching the document store
    Retrieving,

    /// Grading retrieved passages
    Grading,

    /// Rewriting the search text after a failed attempt
    Reformulating,

    /// Drafting an answer
    Synthesizing,

    /// Verifying the draft against accepted passages
    Checking,

    /// Final draft produced (terminal)
    Done,
}

/// Outcomes that drive stage transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageEvent {
    /// Router answered DIRECT
    RouteDirect,

    /// Router answered RETRIEVE, or routing failed
    RouteRetrieve,

    /// Retrieval returned (possibly zero) passages
    PassagesRetrieved,

    /// At least one passage graded relevant
    EvidenceAccepted,

    /// Nothing relevant yet; budget remains for another attempt
    EvidenceRejected,

    /// Nothing relevant and no budget left
    EvidenceExhausted,

    /// Reformulated search text ready
    QueryRewritten,

    /// Draft conditioned on evidence, needs checking
    DraftForChecking,

    /// Draft without evidence, nothing to check
    DraftFinal,

    /// Synthesis failed; retrying on budget
    SynthesisRetry,

    /// Synthesis failed with no budget left; fallback draft
    SynthesisAbandoned,

    /// Checker found the draft grounded
    Grounded,

    /// Checker found unsupported claims; re-synthesizing on budget
    Unsupported,

    /// Unsupported with no budget left; done with caveat
    UnsupportedFinal,

    /// Transition cap hit
    StepLimitReached,
}

impl WorkflowStage {
    /// All stages, in workflow order
    pub const ALL: [WorkflowStage; 7] = [
        WorkflowStage::Routing,
        WorkflowStage::Retrieving,
        WorkflowStage::Grading,
        WorkflowStage::Reformulating,
        WorkflowStage::Synthesizing,
        WorkflowStage::Checking,
        WorkflowStage::Done,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStage::Done)
    }

    /// Attempt a stage transition
    ///
    /// Valid transitions:
    ///
    /// ```text
    /// 1.  Routing       → Synthesizing  (on: RouteDirect)
    /// 2.  Routing       → Retrieving    (on: RouteRetrieve)
    /// 3.  Retrieving    → Grading       (on: PassagesRetrieved)
    /// 4.  Grading       → Synthesizing  (on: EvidenceAccepted | EvidenceExhausted)
    /// 5.  Grading       → Reformulating (on: EvidenceRejected)
    /// 6.  Reformulating → Retrieving    (on: QueryRewritten)
    /// 7.  Synthesizing  → Checking      (on: DraftForChecking)
    /// 8.  Synthesizing  → Synthesizing  (on: SynthesisRetry)
    /// 9.  Synthesizing  → Done          (on: DraftFinal | SynthesisAbandoned)
    /// 10. Checking      → Done          (on: Grounded | UnsupportedFinal)
    /// 11. Checking      → Synthesizing  (on: Unsupported)
    /// 12. Done          → Done          (terminal)
    /// 13. *             → Done          (on: StepLimitReached)
    /// ```
    pub fn transition(&self, event: StageEvent) -> Result<WorkflowStage> {
        use StageEvent::*;
        use WorkflowStage::*;

        if event == StepLimitReached {
            return Ok(Done);
        }

        let next = match (self, event) {
            (Routing, RouteDirect) => Synthesizing,
            (Routing, RouteRetrieve) => Retrieving,

            (Retrieving, PassagesRetrieved) => Grading,

            (Grading, EvidenceAccepted) => Synthesizing,
            (Grading, EvidenceExhausted) => Synthesizing,
            (Grading, EvidenceRejected) => Reformulating,

            (Reformulating, QueryRewritten) => Retrieving,

            (Synthesizing, DraftForChecking) => Checking,
            (Synthesizing, SynthesisRetry) => Synthesizing,
            (Synthesizing, DraftFinal) => Done,
            (Synthesizing, SynthesisAbandoned) => Done,

            (Checking, Grounded) => Done,
            (Checking, UnsupportedFinal) => Done,
            (Checking, Unsupported) => Synthesizing,

            // Terminal self-loop
            (Done, _) => Done,

            (from, event) => {
                return Err(RagError::InvalidTransition {
                    from: format!("{:?}", from),
                    to: format!("{:?}", event),
                    reason: format!("No valid transition from {:?} on {:?}", from, event),
                });
            }
        };

        Ok(next)
    }

    /// Events accepted in this stage
    pub fn valid_events(&self) -> Vec<StageEvent> {
        use StageEvent::*;
        use WorkflowStage::*;

        match self {
            Routing => vec![RouteDirect, RouteRetrieve, StepLimitReached],
            Retrieving => vec![PassagesRetrieved, StepLimitReached],
            Grading => vec![
                EvidenceAccepted,
                EvidenceRejected,
                EvidenceExhausted,
                StepLimitReached,
            ],
            Reformulating => vec![QueryRewritten, StepLimitReached],
            Synthesizing => vec![
                DraftForChecking,
                DraftFinal,
                SynthesisRetry,
                SynthesisAbandoned,
                StepLimitReached,
            ],
            Checking => vec![Grounded, Unsupported, UnsupportedFinal, StepLimitReached],
            Done => vec![StepLimitReached],
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            WorkflowStage::Routing => "Routing query",
            WorkflowStage::Retrieving => "Retrieving passages",
            WorkflowStage::Grading => "Grading relevance",
            WorkflowStage::Reformulating => "Reformulating query",
            WorkflowStage::Synthesizing => "Synthesizing answer",
            WorkflowStage::Checking => "Checking groundedness",
            WorkflowStage::Done => "Done",
        }
    }
}

impl std::fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrieval_path() {
        let mut stage = WorkflowStage::Routing;
        for event in [
            StageEvent::RouteRetrieve,
            StageEvent::PassagesRetrieved,
            StageEvent::EvidenceAccepted,
            StageEvent::DraftForChecking,
            StageEvent::Grounded,
        ] {
            stage = stage.transition(event).unwrap();
        }
        assert_eq!(stage, WorkflowStage::Done);
    }

    #[test]
    fn test_direct_path_skips_checking() {
        let stage = WorkflowStage::Routing
            .transition(StageEvent::RouteDirect)
            .unwrap();
        assert_eq!(stage, WorkflowStage::Synthesizing);
        assert_eq!(
            stage.transition(StageEvent::DraftFinal).unwrap(),
            WorkflowStage::Done
        );
    }

    #[test]
    fn test_rejected_evidence_reformulates() {
        assert_eq!(
            WorkflowStage::Grading
                .transition(StageEvent::EvidenceRejected)
                .unwrap(),
            WorkflowStage::Reformulating
        );
        assert_eq!(
            WorkflowStage::Reformulating
                .transition(StageEvent::QueryRewritten)
                .unwrap(),
            WorkflowStage::Retrieving
        );
    }

    #[test]
    fn test_unsupported_loops_to_synthesis() {
        assert_eq!(
            WorkflowStage::Checking
                .transition(StageEvent::Unsupported)
                .unwrap(),
            WorkflowStage::Synthesizing
        );
        assert_eq!(
            WorkflowStage::Checking
                .transition(StageEvent::UnsupportedFinal)
                .unwrap(),
            WorkflowStage::Done
        );
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(WorkflowStage::Routing
            .transition(StageEvent::Grounded)
            .is_err());
        assert!(WorkflowStage::Retrieving
            .transition(StageEvent::DraftFinal)
            .is_err());

        // Self-loop on Done
        assert_eq!(
            WorkflowStage::Done
                .transition(StageEvent::RouteRetrieve)
                .unwrap(),
            WorkflowStage::Done
        );
    }

    #[test]
    fn test_step_limit_from_any_stage() {
        for stage in WorkflowStage::ALL {
            assert_eq!(
                stage.transition(StageEvent::StepLimitReached).unwrap(),
                WorkflowStage::Done
            );
        }
    }

    #[test]
    fn test_valid_events_match_table() {
        for stage in WorkflowStage::ALL {
            for event in stage.valid_events() {
                assert!(stage.transition(event).is_ok(), "{:?} on {:?}", stage, event);
            }
        }
    }

    #[test]
    fn test_only_done_is_terminal() {
        for stage in WorkflowStage::ALL {
            assert_eq!(stage.is_terminal(), stage == WorkflowStage::Done);
        }
    }
}
