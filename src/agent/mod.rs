//! Agent orchestration module
//!
//! Query router, workflow stage machine, per-query record, and the
//! orchestrator that drives them.

pub mod orchestrator;
pub mod router;
pub mod state;
pub mod workflow;

// Re-export commonly used types
pub use orchestrator::WorkflowOrchestrator;
pub use router::{QueryRouter, RouteDecision};
pub use state::{StageEvent, WorkflowStage};
pub use workflow::WorkflowState;
