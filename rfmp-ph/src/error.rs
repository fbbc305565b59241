//! Error types for rfmp-ph

use thiserror::Error;

/// Errors surfaced by the playback supervisor
///
/// None of these are fatal: after any of them the session is either
/// `Idle` or unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    /// Directory missing, not a directory, or without playable files
    #[error("Directory invalid: {directory}: {reason}")]
    DirectoryInvalid { directory: String, reason: String },

    /// Malformed play request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The player process could not be started
    #[error("Failed to launch player: {0}")]
    LaunchFailed(String),

    /// Supervisor task failure
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Main error type for rfmp-ph
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP server errors (bind failure, serve failure)
    #[error("HTTP server error: {0}")]
    Http(String),
}

/// Convenience Result type using rfmp-ph Error
pub type Result<T> = std::result::Result<T, Error>;
