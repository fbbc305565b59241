//! Error types for rfmp-sh

use thiserror::Error;

/// A captured buffer that cannot be a card id; dropped at capture
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputMalformed {
    #[error("non-digit character {0:?} in scan buffer")]
    NonDigit(char),

    #[error("scan buffer too long ({len} > {max})")]
    TooLong { len: usize, max: usize },

    #[error("scan buffer too short ({len} < {min})")]
    TooShort { len: usize, min: usize },
}

/// Mapping store failures
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing database cannot be reached; never to be read as "not found"
    #[error("Mapping store unavailable: {0}")]
    Unavailable(String),

    /// Rejected write (e.g. empty card id or directory)
    #[error("Invalid mapping: {0}")]
    Invalid(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Main error type for rfmp-sh
#[derive(Error, Debug)]
pub enum Error {
    /// Dispatch client construction errors
    #[error("Dispatch client error: {0}")]
    Dispatch(String),

    /// HTTP server errors (bind failure, serve failure)
    #[error("HTTP server error: {0}")]
    Http(String),
}

/// Convenience Result type using rfmp-sh Error
pub type Result<T> = std::result::Result<T, Error>;
