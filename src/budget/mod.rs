//! Retry budget system
//!
//! A single counter shared by every loop edge of the workflow (query
//! reformulation, check-driven re-synthesis, synthesis retry), so one query
//! can only ever take a bounded number of steps.

pub mod manager;
pub mod types;

pub use manager::RetryBudget;
pub use types::{BudgetWarning, RetrySpend};
