//! Common error types for Feedplay

use thiserror::Error;

/// Common result type for Feedplay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the server and the client engine
///
/// A deduplicated play is deliberately absent: it is a successful
/// `PlayOutcome { accepted: false }`, not an error.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Track, user or record absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid bearer credential
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Retryable failure (network hiccup, locked database)
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when repeating the whole operation may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transient(_) => true,
            #[cfg(feature = "sqlx")]
            Error::Database(e) => is_busy(e),
            _ => false,
        }
    }
}

/// SQLite reports lock contention as SQLITE_BUSY (5) or SQLITE_LOCKED (6)
#[cfg(feature = "sqlx")]
fn is_busy(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => matches!(
            db_err.code().as_deref(),
            Some("5") | Some("6") | Some("517") | Some("262")
        ),
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}
