//! Error types for the orchestration engine

use thiserror::Error;

/// Main error type for the engine
///
/// Remote command failures are not errors: they come back as a
/// [`CommandResult`](crate::remote::result::CommandResult) and end up as a
/// `failed` record. This type covers everything that happens before a remote
/// command runs, or outside the command path entirely.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("CI trigger error: {0}")]
    Trigger(String),

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Internal(err.to_string())
    }
}
