//! Playback supervisor
//!
//! Owns the single [`PlaybackSession`](session::PlaybackSession) and the
//! external player process behind it.
//!
//! State machine: `Idle → Starting → Playing → Stopping → Idle`, no terminal
//! state. All transitions happen while holding one async mutex (the
//! transition lock), including the bounded wait for a stopping player to
//! exit. That lock is what keeps at most one player alive when play requests
//! arrive concurrently over the network.
//!
//! Requests queue on the lock. Each request takes a ticket from
//! `latest_intent` on arrival; a request whose ticket is no longer the latest
//! once it gets the lock has been overtaken and returns `Superseded` without
//! acting, so the most recent intent wins.
//!
//! Status reads go through a `watch` channel and never touch the lock.

mod library;
mod process;
mod session;

pub use library::{discover_audio_files, resolve_directory};

use crate::config::PlayerConfig;
use crate::error::SupervisorError;
use chrono::Utc;
use process::{ExitReport, PlayerProcess, StopResult};
use rfmp_common::api::{PlayCommand, PlayOutcome, StatusResponse};
use rfmp_common::{PlayerEvent, SessionState, StopReason};
use session::{status_of, ActiveSession, PlaybackSession, SessionMeta};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A request to play a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayRequest {
    /// Directory as sent by the caller (relative to the music root or absolute)
    pub directory: String,
    /// Card that triggered the request, for status and events
    pub card_id: Option<String>,
}

impl PlayRequest {
    pub fn new(directory: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            card_id: None,
        }
    }
}

impl From<PlayCommand> for PlayRequest {
    fn from(cmd: PlayCommand) -> Self {
        Self {
            directory: cmd.directory,
            card_id: Some(cmd.card_id),
        }
    }
}

/// Cloneable handle to the playback supervisor
#[derive(Clone)]
pub struct PlaybackSupervisor {
    inner: Arc<Inner>,
}

struct Inner {
    music_root: PathBuf,
    player: PlayerConfig,
    /// Transition lock
    session: Mutex<PlaybackSession>,
    status_tx: watch::Sender<StatusResponse>,
    event_tx: broadcast::Sender<PlayerEvent>,
    exit_tx: mpsc::UnboundedSender<ExitReport>,
    latest_intent: AtomicU64,
}

impl PlaybackSupervisor {
    /// Create a supervisor in the `Idle` state
    ///
    /// Must be called from within a Tokio runtime: it starts the task that
    /// receives player exit reports.
    pub fn new(music_root: PathBuf, player: PlayerConfig) -> Self {
        let (status_tx, _) = watch::channel(StatusResponse::default());
        let (event_tx, _) = broadcast::channel(64);
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(Inner {
            music_root,
            player,
            session: Mutex::new(PlaybackSession::default()),
            status_tx,
            event_tx,
            exit_tx,
            latest_intent: AtomicU64::new(0),
        });

        tokio::spawn(watch_exits(Arc::downgrade(&inner), exit_rx));

        Self { inner }
    }

    /// RequestPlay: make `request.directory` the one playing directory
    ///
    /// - same directory already playing: `AlreadyPlaying`, nothing changes
    /// - another directory playing: it is stopped (graceful, then forced
    ///   after the grace period) before the new player starts
    /// - overtaken by a newer request while queued: `Superseded`
    ///
    /// The transition runs on its own task; if the caller stops waiting the
    /// transition still completes and the session never stays `Starting`
    /// or `Stopping`.
    pub async fn request_play(&self, request: PlayRequest) -> Result<PlayOutcome, SupervisorError> {
        let resolved = resolve_directory(&self.inner.music_root, &request.directory)?;
        let ticket = self.inner.latest_intent.fetch_add(1, Ordering::SeqCst) + 1;

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.play(request, resolved, ticket).await })
            .await
            .map_err(|e| SupervisorError::Internal(format!("play task failed: {}", e)))?
    }

    /// Stop whatever is playing; supersedes queued play requests
    pub async fn stop(&self) -> Result<StatusResponse, SupervisorError> {
        self.inner.latest_intent.fetch_add(1, Ordering::SeqCst);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut session = inner.session.lock().await;
            inner.stop_locked(&mut session, StopReason::Requested).await;
        })
        .await
        .map_err(|e| SupervisorError::Internal(format!("stop task failed: {}", e)))?;

        Ok(self.query_status())
    }

    /// Stop the player before the service exits
    pub async fn shutdown(&self) {
        self.inner.latest_intent.fetch_add(1, Ordering::SeqCst);
        let mut session = self.inner.session.lock().await;
        self.inner.stop_locked(&mut session, StopReason::Shutdown).await;
    }

    /// QueryStatus: current state and directory; never blocks
    pub fn query_status(&self) -> StatusResponse {
        self.inner.status_tx.borrow().clone()
    }

    /// Follow status changes
    pub fn watch_status(&self) -> watch::Receiver<StatusResponse> {
        self.inner.status_tx.subscribe()
    }

    /// Subscribe to supervisor events
    pub fn subscribe_events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.inner.event_tx.subscribe()
    }

    pub fn music_root(&self) -> &Path {
        &self.inner.music_root
    }

    pub fn player_config(&self) -> &PlayerConfig {
        &self.inner.player
    }
}

impl Inner {
    async fn play(
        &self,
        request: PlayRequest,
        resolved: PathBuf,
        ticket: u64,
    ) -> Result<PlayOutcome, SupervisorError> {
        let mut session = self.session.lock().await;

        if self.latest_intent.load(Ordering::SeqCst) != ticket {
            info!(directory = %request.directory, "Play request superseded by a newer request");
            return Ok(PlayOutcome::Superseded);
        }

        // A player that died since the last request is a crash, not a session
        if let Some(report) = session.active_exit().await {
            self.crash_locked(&mut session, report);
        }

        if session.is_playing(&resolved) {
            info!(directory = %request.directory, "Already playing, request ignored");
            return Ok(PlayOutcome::AlreadyPlaying);
        }

        self.stop_locked(&mut session, StopReason::Replaced).await;

        let files = match discover_audio_files(
            &resolved,
            &request.directory,
            &self.player.audio_extension,
        )
        .await
        {
            Ok(files) => files,
            Err(e) => {
                warn!("Rejecting play request: {}", e);
                return Err(e);
            }
        };

        let mut meta = SessionMeta {
            id: Uuid::new_v4(),
            directory: request.directory,
            resolved,
            card_id: request.card_id,
            started_at: None,
        };
        self.set_state(&mut session, SessionState::Starting, Some(&meta));

        let process = match PlayerProcess::spawn(&self.player, &files, meta.id, self.exit_tx.clone()) {
            Ok(process) => process,
            Err(e) => {
                error!(program = %self.player.program, "Failed to launch player: {}", e);
                self.set_state(&mut session, SessionState::Idle, None);
                return Err(SupervisorError::LaunchFailed(format!(
                    "{}: {}",
                    self.player.program, e
                )));
            }
        };

        meta.started_at = Some(Utc::now());
        info!(
            directory = %meta.directory,
            files = files.len(),
            pid = ?process.pid(),
            "Playback started"
        );
        self.set_state(&mut session, SessionState::Playing, Some(&meta));
        self.emit(PlayerEvent::PlaybackStarted {
            session_id: meta.id,
            card_id: meta.card_id.clone(),
            directory: meta.directory.clone(),
            file_count: files.len(),
            timestamp: Utc::now(),
        });
        session.active = Some(ActiveSession { meta, process });

        Ok(PlayOutcome::Started)
    }

    /// Stop the active player, if any; caller holds the transition lock
    async fn stop_locked(&self, session: &mut PlaybackSession, reason: StopReason) -> Option<StopResult> {
        let ActiveSession { meta, process } = session.active.take()?;

        self.set_state(session, SessionState::Stopping, Some(&meta));
        let pid = process.pid();
        let result = process.stop(self.player.grace_period()).await;

        match result {
            StopResult::Forced => warn!(directory = %meta.directory, ?pid, "Player killed after grace period"),
            _ => info!(directory = %meta.directory, ?pid, ?reason, "Playback stopped"),
        }

        self.set_state(session, SessionState::Idle, None);
        self.emit(PlayerEvent::PlaybackStopped {
            session_id: meta.id,
            directory: meta.directory,
            reason,
            forced: result == StopResult::Forced,
            timestamp: Utc::now(),
        });

        Some(result)
    }

    /// Crash-monitor callback
    async fn handle_exit(&self, report: ExitReport) {
        let mut session = self.session.lock().await;

        if session.playing_id() != Some(report.session_id) {
            debug!(session_id = %report.session_id, "Exit of a retired session ignored");
            return;
        }
        self.crash_locked(&mut session, report);
    }

    /// Retire a session whose player exited on its own; caller holds the
    /// transition lock
    fn crash_locked(&self, session: &mut PlaybackSession, report: ExitReport) {
        let Some(ActiveSession { meta, .. }) = session.active.take() else {
            return;
        };

        let exit_code = report.status.and_then(|status| status.code());
        error!(
            directory = %meta.directory,
            ?exit_code,
            "Player process exited unexpectedly"
        );

        self.set_state(session, SessionState::Idle, None);
        self.emit(PlayerEvent::PlaybackCrashed {
            session_id: meta.id,
            directory: meta.directory,
            exit_code,
            timestamp: Utc::now(),
        });
    }

    fn set_state(&self, session: &mut PlaybackSession, new_state: SessionState, meta: Option<&SessionMeta>) {
        let old_state = session.state;
        session.state = new_state;
        self.status_tx.send_replace(status_of(new_state, meta));

        debug!(%old_state, %new_state, "Session state changed");
        self.emit(PlayerEvent::SessionStateChanged {
            old_state,
            new_state,
            directory: meta.map(|m| m.directory.clone()),
            timestamp: Utc::now(),
        });
    }

    fn emit(&self, event: PlayerEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }
}

async fn watch_exits(inner: Weak<Inner>, mut exit_rx: mpsc::UnboundedReceiver<ExitReport>) {
    while let Some(report) = exit_rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.handle_exit(report).await;
    }
    debug!("Exit watcher finished");
}
