//! Client-side error types

use thiserror::Error;

/// Result alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Failures of the HTTP client, the session or the scheduler channel
#[derive(Debug, Error)]
pub enum ClientError {
    /// Missing, invalidated or rejected credential
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Network failure, timeout or 5xx; the request may be retried
    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The scheduler task has stopped
    #[error("Scheduler closed")]
    SchedulerClosed,
}

impl ClientError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Transient(err.to_string())
        }
    }
}

impl From<fp_common::Error> for ClientError {
    fn from(err: fp_common::Error) -> Self {
        use fp_common::Error;

        match err {
            Error::NotFound(msg) => ClientError::NotFound(msg),
            Error::Unauthorized(msg) => ClientError::Unauthorized(msg),
            Error::InvalidInput(msg) => ClientError::InvalidInput(msg),
            Error::Transient(msg) => ClientError::Transient(msg),
            Error::Config(msg) => ClientError::Config(msg),
            other => ClientError::Api(500, other.to_string()),
        }
    }
}
