//! The single playback session owned by the supervisor

use super::process::{ExitReport, PlayerProcess};
use chrono::{DateTime, Utc};
use rfmp_common::api::StatusResponse;
use rfmp_common::SessionState;
use std::path::PathBuf;
use uuid::Uuid;

/// Identity of a session that is starting, playing or stopping
#[derive(Debug, Clone)]
pub(crate) struct SessionMeta {
    pub id: Uuid,
    /// Directory exactly as requested
    pub directory: String,
    /// Directory after resolution against the music root
    pub resolved: PathBuf,
    pub card_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

/// A running player and what it is playing
pub(crate) struct ActiveSession {
    pub meta: SessionMeta,
    pub process: PlayerProcess,
}

/// Process-wide playback session
///
/// Only ever accessed through the supervisor's transition lock.
/// Invariant: `active` is Some exactly when `state` is `Playing`
/// (it is taken out for the duration of `Stopping`).
#[derive(Default)]
pub(crate) struct PlaybackSession {
    pub state: SessionState,
    pub active: Option<ActiveSession>,
}

impl PlaybackSession {
    /// True if `resolved` is the directory currently playing
    pub fn is_playing(&self, resolved: &std::path::Path) -> bool {
        self.state == SessionState::Playing
            && self
                .active
                .as_ref()
                .map(|active| active.meta.resolved == resolved)
                .unwrap_or(false)
    }

    /// Exit of the active player, if it has died without a stop request
    pub async fn active_exit(&self) -> Option<ExitReport> {
        match &self.active {
            Some(active) => active.process.check_exited().await,
            None => None,
        }
    }

    /// Id of the playing session, if any
    pub fn playing_id(&self) -> Option<Uuid> {
        match (&self.state, &self.active) {
            (SessionState::Playing, Some(active)) => Some(active.meta.id),
            _ => None,
        }
    }
}

/// Build the externally visible status for a state and optional session
pub(crate) fn status_of(state: SessionState, meta: Option<&SessionMeta>) -> StatusResponse {
    match meta {
        Some(meta) => StatusResponse {
            state,
            directory: Some(meta.directory.clone()),
            card_id: meta.card_id.clone(),
            started_at: meta.started_at,
        },
        None => StatusResponse {
            state,
            ..StatusResponse::default()
        },
    }
}
