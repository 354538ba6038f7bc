//! Error types for agentrag
//!
//! One error enum for the whole crate. Component failures carry a message;
//! the orchestrator maps each of them to that component's safe default, so
//! only `Cancelled` and `WorkflowFailure` ever reach a caller of the workflow.

use thiserror::Error;

/// Main error type for the agentic RAG system
#[derive(Error, Debug)]
pub enum RagError {
    /// Query router could not produce a decision
    #[error("Routing failed: {0}")]
    Routing(String),

    /// Document store unavailable or rejected the search
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// Relevance grading call failed for a passage
    #[error("Grading failed: {0}")]
    Grading(String),

    /// Answer synthesis call failed
    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    /// Groundedness check call failed
    #[error("Groundedness check failed: {0}")]
    Check(String),

    /// External call exceeded its per-call timeout
    #[error("{component} call timed out after {duration_ms}ms")]
    Timeout { component: String, duration_ms: u64 },

    /// Query aborted by an external cancellation signal
    #[error("Workflow cancelled")]
    Cancelled,

    /// No evidence and no synthesis possible
    #[error("Workflow failed: {0}")]
    WorkflowFailure(String),

    /// State machine transition errors
    #[error("Invalid stage transition from {from} via {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Vector store errors outside of a retrieval call
    #[error("Store error: {0}")]
    Store(String),

    /// Reasoning backend API errors
    #[error("Backend error: {0}")]
    Backend(String),

    /// Streaming response could not be decoded
    #[error("Stream decode error: {0}")]
    StreamDecode(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RagError {
    /// Whether this error is the cancellation signal rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RagError::Cancelled)
    }

    /// Whether a backend call failing with this error is worth repeating
    pub fn is_transient(&self) -> bool {
        match self {
            RagError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            RagError::Backend(msg) => msg.starts_with("HTTP 5") || msg.contains("overloaded"),
            RagError::Timeout { .. } => true,
            _ => false,
        }
    }
}

/// Result type alias for agentrag operations
pub type Result<T> = std::result::Result<T, RagError>;

/// Convert anyhow errors from the ingestion edge
impl From<anyhow::Error> for RagError {
    fn from(err: anyhow::Error) -> Self {
        RagError::Store(format!("{:#}", err))
    }
}
