//! Player child process control
//!
//! Each launched player gets a monitor task that owns the `Child` for its
//! whole lifetime. The supervisor talks to the monitor through channels:
//! - a stop request (with reply) asks the monitor to terminate the child
//! - a liveness check (with reply) makes the monitor reap an exited child
//! - an exit report tells the supervisor the child exited on its own
//!
//! The monitor never touches supervisor state, so it can always make
//! progress while the supervisor holds its transition lock.

use crate::config::PlayerConfig;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

/// Sent to the supervisor when a child exits without a stop request
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExitReport {
    pub session_id: Uuid,
    /// None if waiting on the child failed
    pub status: Option<ExitStatus>,
}

/// How a stop request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopResult {
    /// Exited within the grace period
    Graceful,
    /// Killed after the grace period expired
    Forced,
    /// Had already exited before the request was handled
    AlreadyExited,
}

struct StopRequest {
    grace: Duration,
    reply: oneshot::Sender<StopResult>,
}

/// Handle to a running player, held only by the supervisor's session
pub(crate) struct PlayerProcess {
    pid: Option<u32>,
    stop_tx: Option<oneshot::Sender<StopRequest>>,
    check_tx: mpsc::UnboundedSender<oneshot::Sender<()>>,
    /// Set by the monitor before the exit report is sent
    exited: Arc<OnceLock<ExitReport>>,
}

impl PlayerProcess {
    /// Launch the player for `files` and start its monitor task
    pub fn spawn(
        config: &PlayerConfig,
        files: &[PathBuf],
        session_id: Uuid,
        exit_tx: mpsc::UnboundedSender<ExitReport>,
    ) -> std::io::Result<Self> {
        let mut command = Command::new(&config.program);
        command
            .args(&config.args)
            .args(files)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let child = command.spawn()?;
        let pid = child.id();
        debug!(?pid, %session_id, "Player process spawned");

        let (stop_tx, stop_rx) = oneshot::channel();
        let (check_tx, check_rx) = mpsc::unbounded_channel();
        let exited = Arc::new(OnceLock::new());
        let monitor = Monitor {
            session_id,
            exit_tx,
            exited: Arc::clone(&exited),
        };
        tokio::spawn(monitor.run(child, stop_rx, check_rx));

        Ok(Self {
            pid,
            stop_tx: Some(stop_tx),
            check_tx,
            exited,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// The exit of a player that died on its own, if it has died
    ///
    /// Reaps the child if it has exited but the monitor has not noticed
    /// yet, so the answer does not depend on task scheduling.
    pub async fn check_exited(&self) -> Option<ExitReport> {
        if let Some(report) = self.exited.get() {
            return Some(*report);
        }

        let (reply, reply_rx) = oneshot::channel();
        if self.check_tx.send(reply).is_ok() {
            // Closed without a reply means the monitor has finished
            let _ = reply_rx.await;
        }
        self.exited.get().copied()
    }

    /// Terminate the player: polite signal, then kill after `grace`
    ///
    /// Returns once the child is confirmed gone.
    pub async fn stop(mut self, grace: Duration) -> StopResult {
        let Some(stop_tx) = self.stop_tx.take() else {
            return StopResult::AlreadyExited;
        };

        let (reply, reply_rx) = oneshot::channel();
        if stop_tx.send(StopRequest { grace, reply }).is_err() {
            // Monitor already saw the exit and went away
            return StopResult::AlreadyExited;
        }

        reply_rx.await.unwrap_or(StopResult::AlreadyExited)
    }
}

struct Monitor {
    session_id: Uuid,
    exit_tx: mpsc::UnboundedSender<ExitReport>,
    exited: Arc<OnceLock<ExitReport>>,
}

impl Monitor {
    async fn run(
        self,
        mut child: Child,
        mut stop_rx: oneshot::Receiver<StopRequest>,
        mut check_rx: mpsc::UnboundedReceiver<oneshot::Sender<()>>,
    ) {
        loop {
            tokio::select! {
                status = child.wait() => {
                    if let Err(e) = &status {
                        warn!(session_id = %self.session_id, "Failed to wait on player process: {}", e);
                    }
                    // A stop request racing the exit resolves as AlreadyExited
                    stop_rx.close();
                    self.report_exit(status.ok());
                    return;
                }
                request = &mut stop_rx => {
                    match request {
                        Ok(StopRequest { grace, reply }) => {
                            let result = terminate(&mut child, grace).await;
                            let _ = reply.send(result);
                        }
                        Err(_) => {
                            // Handle dropped without a stop request
                            terminate(&mut child, Duration::ZERO).await;
                        }
                    }
                    return;
                }
                Some(reply) = check_rx.recv() => {
                    match child.try_wait() {
                        Ok(Some(status)) => {
                            stop_rx.close();
                            self.report_exit(Some(status));
                            let _ = reply.send(());
                            return;
                        }
                        Ok(None) => {
                            let _ = reply.send(());
                        }
                        Err(e) => {
                            warn!(session_id = %self.session_id, "Failed to poll player process: {}", e);
                            let _ = reply.send(());
                        }
                    }
                }
            }
        }
    }

    fn report_exit(&self, status: Option<ExitStatus>) {
        let report = ExitReport {
            session_id: self.session_id,
            status,
        };
        let _ = self.exited.set(report);
        let _ = self.exit_tx.send(report);
    }
}

async fn terminate(child: &mut Child, grace: Duration) -> StopResult {
    let Some(pid) = child.id() else {
        return StopResult::AlreadyExited;
    };

    #[cfg(unix)]
    {
        if !grace.is_zero() {
            // Polite stop first
            // SAFETY: kill(2) has no memory-safety preconditions; pid is our own unreaped child.
            let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
            if rc != 0 {
                debug!(pid, "SIGTERM failed: {}", std::io::Error::last_os_error());
            }

            match tokio::time::timeout(grace, child.wait()).await {
                Ok(Ok(status)) => {
                    debug!(pid, %status, "Player exited within grace period");
                    return StopResult::Graceful;
                }
                Ok(Err(e)) => warn!(pid, "Failed to wait on player process: {}", e),
                Err(_) => warn!(pid, "Player did not exit within {:?}, killing", grace),
            }
        }
    }

    #[cfg(not(unix))]
    let _ = grace;

    // kill() also reaps the child
    if let Err(e) = child.kill().await {
        warn!(pid, "Failed to kill player process: {}", e);
    }
    StopResult::Forced
}
