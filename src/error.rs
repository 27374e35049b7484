//! Error types for the feed client and aggregation engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Name <{0}> is already registered")]
    AlreadyRegistered(String),

    #[error("Name <{0}> is not registered")]
    NotRegistered(String),

    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    #[error("JSON parsing error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Received an empty batch")]
    EmptyBatch,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FeedError {
    /// Whether the error ends a `run()` call (transport or handshake failure).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FeedError::Connection(_) | FeedError::Authentication(_) | FeedError::Protocol(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;
