//! Session states and player events shared by both RFMP hosts
//!
//! The playback host broadcasts [`PlayerEvent`]s to SSE clients. Both hosts
//! read [`SessionState`] through `StatusResponse`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Playback session state
///
/// `Idle` is the initial state. There is no terminal state: the playback
/// host is a long-running service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Starting,
    Playing,
    Stopping,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Starting => write!(f, "starting"),
            SessionState::Playing => write!(f, "playing"),
            SessionState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Why a running session was stopped
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A play request for a different directory replaced the session
    Replaced,
    /// Explicit stop request
    Requested,
    /// Service shutdown
    Shutdown,
}

/// Events emitted by the playback supervisor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Session state machine transition
    SessionStateChanged {
        old_state: SessionState,
        new_state: SessionState,
        /// Directory of the session involved, as requested
        directory: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Player process launched for a directory
    PlaybackStarted {
        session_id: Uuid,
        card_id: Option<String>,
        directory: String,
        /// Number of audio files handed to the player
        file_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Player process stopped on request
    PlaybackStopped {
        session_id: Uuid,
        directory: String,
        reason: StopReason,
        /// True if the grace period expired and the process was killed
        forced: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Player process exited while nobody asked it to
    PlaybackCrashed {
        session_id: Uuid,
        directory: String,
        /// Exit code, if the process exited normally (None if signalled)
        exit_code: Option<i32>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PlayerEvent {
    /// Event name used for the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            PlayerEvent::SessionStateChanged { .. } => "SessionStateChanged",
            PlayerEvent::PlaybackStarted { .. } => "PlaybackStarted",
            PlayerEvent::PlaybackStopped { .. } => "PlaybackStopped",
            PlayerEvent::PlaybackCrashed { .. } => "PlaybackCrashed",
        }
    }
}
