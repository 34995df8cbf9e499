//! Shared error types and utilities for the botscope project.
pub use color_eyre::Report;

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("Failed to install color_eyre")]
    ColorEyre(#[from] color_eyre::Report),
    #[error("Failed to install tracing-subscriber")]
    TracingSubscriber(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Validation failures raised while building a session record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("score must be between 0 and 100, got {0}")]
    ScoreOutOfRange(i64),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
