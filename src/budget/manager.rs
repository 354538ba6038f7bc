//! Shared retry budget
//!
//! Guarantees:
//! - Bounded: used ≤ allocated at all times; remaining never underflows
//! - Monotone: consumption never gives units back
//! - Accounted: every spend is recorded with the loop edge that took it

use tracing::debug;

use crate::budget::types::{BudgetWarning, RetrySpend};

/// Per-query retry budget
#[derive(Debug, Clone)]
pub struct RetryBudget {
    allocated: usize,
    used: usize,
    ledger: Vec<RetrySpend>,
    last_warning: Option<BudgetWarning>,
}

impl RetryBudget {
    /// Full budget of `allocated` retries
    pub fn new(allocated: usize) -> Self {
        Self {
            allocated,
            used: 0,
            ledger: Vec::with_capacity(allocated),
            last_warning: None,
        }
    }

    /// Spend one unit; false (and nothing spent) when exhausted
    pub fn try_consume(&mut self, spend: RetrySpend) -> bool {
        if self.is_exhausted() {
            debug!(edge = spend.as_str(), "retry budget exhausted");
            return false;
        }
        self.used += 1;
        self.ledger.push(spend);
        debug!(
            edge = spend.as_str(),
            remaining = self.remaining(),
            "retry budget consumed"
        );
        true
    }

    pub fn remaining(&self) -> usize {
        self.allocated.saturating_sub(self.used)
    }

    pub fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.allocated
    }

    pub fn allocated(&self) -> usize {
        self.allocated
    }

    pub fn used(&self) -> usize {
        self.used
    }

    /// Spends in the order they happened
    pub fn ledger(&self) -> &[RetrySpend] {
        &self.ledger
    }

    /// Units spent on a given loop edge
    pub fn spent_on(&self, spend: RetrySpend) -> usize {
        self.ledger.iter().filter(|s| **s == spend).count()
    }

    /// New warning since the last call, if any
    pub fn check_warning(&mut self) -> Option<BudgetWarning> {
        let warning = if self.is_exhausted() && self.used > 0 {
            BudgetWarning::Exhausted {
                used: self.used,
                allocated: self.allocated,
            }
        } else if self.remaining() == 1 && self.used > 0 {
            BudgetWarning::LastRetry {
                used: self.used,
                allocated: self.allocated,
            }
        } else {
            return None;
        };

        if self.last_warning.as_ref() == Some(&warning) {
            return None;
        }
        self.last_warning = Some(warning.clone());
        Some(warning)
    }
}
