//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Input was rejected before anything was written.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A message, user or mailbox entry does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness rule was violated (duplicate entry or email).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The target exists but is not in a state that allows the operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Database operation failed. The in-flight transaction was rolled back.
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of an [`Error`], for callers that surface the kind
/// next to the human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`Error::Validation`].
    Validation,
    /// See [`Error::NotFound`].
    NotFound,
    /// See [`Error::Conflict`].
    Conflict,
    /// See [`Error::InvalidState`].
    InvalidState,
    /// Storage, I/O, serialization or configuration failures.
    Storage,
}

impl Error {
    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::Storage(_) | Self::Serde(_) | Self::Io(_) | Self::Config(_) => {
                ErrorKind::Storage
            }
        }
    }

    /// Maps a unique-constraint violation to [`Error::Conflict`], passing any
    /// other database error through unchanged.
    pub(crate) fn from_unique_violation(err: sqlx::Error, message: impl Into<String>) -> Self {
        let unique = matches!(&err, sqlx::Error::Database(db) if db.is_unique_violation());
        if unique {
            Self::Conflict(message.into())
        } else {
            Self::Storage(err)
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
