//! Request/response types for the playback host API

use crate::events::SessionState;
use serde::{Deserialize, Serialize};

/// Play request sent from the scan host to the playback host
///
/// Idempotent: sending the same command while that directory is already
/// playing is a no-op on the playback host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayCommand {
    pub card_id: String,
    /// Directory to play, relative to the playback host's music root or absolute
    pub directory: String,
}

/// Result of an accepted play request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayOutcome {
    /// A new player process was launched
    Started,
    /// The requested directory was already playing; nothing changed
    AlreadyPlaying,
    /// A newer request arrived before this one was acted upon
    Superseded,
}

impl std::fmt::Display for PlayOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayOutcome::Started => write!(f, "started"),
            PlayOutcome::AlreadyPlaying => write!(f, "already_playing"),
            PlayOutcome::Superseded => write!(f, "superseded"),
        }
    }
}

/// Snapshot of the playback session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StatusResponse {
    pub state: SessionState,
    /// Directory as requested; None while idle
    pub directory: Option<String>,
    /// Card that triggered the session, if known
    pub card_id: Option<String>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// POST /play success body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayResponse {
    pub outcome: PlayOutcome,
    pub status: StatusResponse,
}

/// Machine-readable error category in error bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DirectoryInvalid,
    BadRequest,
    LaunchFailed,
    Internal,
}

/// Error body returned by the playback host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub error: String,
}
