//! Error types for the chat session orchestrator

use thiserror::Error;

/// Result type alias for session and turn operations
pub type Result<T> = std::result::Result<T, ChatError>;

#[derive(Error, Debug)]
pub enum ChatError {

    // =============================
    // Core Errors
    // =============================

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upstream model error: {0}")]
    Upstream(String),

    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session {0} was deleted or reset during the turn")]
    SessionReset(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// True for failures that originate outside this process (network, remote payload).
    pub fn is_upstream(&self) -> bool {
        matches!(self, ChatError::Upstream(_) | ChatError::MalformedResponse(_))
    }
}
