//! Error types for omnik-store.

use std::path::PathBuf;

use omnik_types::ParseError;

/// Result type for omnik-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in omnik-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A query that expects a row found none.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A caller-supplied argument was rejected.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The store cannot be opened or its schema cannot be created.
    ///
    /// Continuing would leave an unusable store, so callers should
    /// terminate.
    #[error("Fatal configuration error: {0}")]
    FatalConfiguration(String),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A stored date, time or timestamp could not be interpreted.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Another thread panicked while holding the connection.
    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

impl Error {
    /// Whether the store cannot continue and the process should stop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::FatalConfiguration(_) | Error::CreateDirectory { .. }
        )
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::InvalidArgument(err.to_string())
    }
}
