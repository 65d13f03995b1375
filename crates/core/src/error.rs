//! Error types for the carebridge domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all carebridge operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Record store errors ---
    #[error("Record store error: {0}")]
    Record(#[from] RecordError),

    // --- Agent errors ---
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    // --- Session errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool unavailable: {tool_name} — {reason}")]
    Unavailable { tool_name: String, reason: String },

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_ms}ms")]
    Timeout { tool_name: String, timeout_ms: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

impl ToolError {
    /// Whether a retry could plausibly succeed (network hiccup, slow backend).
    pub fn is_transient(&self) -> bool {
        matches!(self, ToolError::Timeout { .. } | ToolError::Unavailable { .. })
    }

    /// The tool that produced this error, when known.
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            ToolError::Unavailable { tool_name, .. }
            | ToolError::ExecutionFailed { tool_name, .. }
            | ToolError::Timeout { tool_name, .. } => Some(tool_name),
            ToolError::InvalidArguments(_) => None,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum RecordError {
    #[error("Record store unavailable: {0}")]
    Unavailable(String),

    #[error("Record query failed: {0}")]
    QueryFailed(String),

    #[error("Invalid patient record: {0}")]
    InvalidRecord(String),
}

impl From<RecordError> for ToolError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::Unavailable(reason) => ToolError::Unavailable {
                tool_name: "record_store".into(),
                reason,
            },
            other => ToolError::ExecutionFailed {
                tool_name: "record_store".into(),
                reason: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error("{0}")]
    Tool(#[from] ToolError),

    #[error("Answer synthesis failed: {0}")]
    Synthesis(#[from] ProviderError),

    #[error("Handoff protocol violation: {0}")]
    Protocol(String),

    /// A second handoff was requested within one dispatch.
    #[error("Handoff loop: {first} then {second} within one dispatch")]
    HandoffLoop { first: String, second: String },

    #[error("Dispatch timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Unknown session: {0}")]
    NotFound(String),
}
