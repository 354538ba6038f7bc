//! CLI module for agentrag
//!
//! Argument parsing, terminal rendering, and system diagnostics.

pub mod args;
pub mod display;
pub mod doctor;

pub use args::{Args, Commands, StoreArg, Verbosity};
pub use doctor::{Doctor, HealthCheck, HealthStatus};
