//! Budget system type definitions

use serde::{Deserialize, Serialize};

/// Loop edge that consumed one unit of budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RetrySpend {
    /// No relevant passages; rewrite the query and search again
    Reformulation,
    /// Checker flagged the draft as unsupported; synthesize again, stricter
    Resynthesis,
    /// Synthesis call failed; try it once more
    SynthesisRetry,
}

impl RetrySpend {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrySpend::Reformulation => "reformulation",
            RetrySpend::Resynthesis => "resynthesis",
            RetrySpend::SynthesisRetry => "synthesis_retry",
        }
    }
}

/// Budget warning types
#[derive(Debug, Clone, PartialEq)]
pub enum BudgetWarning {
    /// One unit left
    LastRetry { used: usize, allocated: usize },

    /// Budget exhausted; loop edges are now closed
    Exhausted { used: usize, allocated: usize },
}
