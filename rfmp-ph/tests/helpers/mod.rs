//! Shared helpers for rfmp-ph integration tests
//!
//! The "player" in these tests is `/bin/sh` running a small script that
//! appends its own pid to a log file and then sleeps, so tests can count
//! launches and check which players are still alive.

#![allow(dead_code)]

use rfmp_common::api::StatusResponse;
use rfmp_common::PlayerEvent;
use rfmp_ph::config::PlayerConfig;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{broadcast, watch};

/// Scratch music root with album directories
pub struct MusicRoot {
    pub dir: TempDir,
}

impl MusicRoot {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create `relative` with `tracks` mp3 files in it
    pub fn album(&self, relative: &str, tracks: usize) -> PathBuf {
        let album = self.dir.path().join(relative);
        fs::create_dir_all(&album).expect("create album");
        for n in 0..tracks {
            fs::write(album.join(format!("{:02}.mp3", n + 1)), b"").expect("write track");
        }
        album
    }

    pub fn spawn_log(&self) -> PathBuf {
        self.dir.path().join("spawn.log")
    }
}

/// Player that records its pid and exits promptly on SIGTERM
pub fn cooperative_player(log: &Path, grace_ms: u64) -> PlayerConfig {
    script_player(
        &format!("echo $$ >> '{}'; exec sleep 30", log.display()),
        grace_ms,
    )
}

/// Player that records its pid and ignores SIGTERM
pub fn stubborn_player(log: &Path, grace_ms: u64) -> PlayerConfig {
    script_player(
        &format!(
            "echo $$ >> '{}'; trap '' TERM; while :; do sleep 0.05; done",
            log.display()
        ),
        grace_ms,
    )
}

fn script_player(script: &str, grace_ms: u64) -> PlayerConfig {
    PlayerConfig {
        program: "/bin/sh".to_string(),
        // Audio files are appended after "player" and become $1.. for the script
        args: vec!["-c".to_string(), script.to_string(), "player".to_string()],
        audio_extension: "mp3".to_string(),
        grace_period_ms: grace_ms,
    }
}

/// Pids recorded so far
pub fn read_pids(log: &Path) -> Vec<i32> {
    fs::read_to_string(log)
        .unwrap_or_default()
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}

/// Wait until at least `count` launches have been recorded
pub async fn wait_for_pids(log: &Path, count: usize) -> Vec<i32> {
    for _ in 0..200 {
        let pids = read_pids(log);
        if pids.len() >= count {
            return pids;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {} player launches in {}", count, log.display());
}

pub fn process_alive(pid: i32) -> bool {
    // Signal 0 only checks for existence
    unsafe { libc::kill(pid, 0) == 0 }
}

pub fn alive_count(pids: &[i32]) -> usize {
    pids.iter().filter(|pid| process_alive(**pid)).count()
}

/// Wait for a status matching `pred`
pub async fn wait_for_status<F>(rx: &mut watch::Receiver<StatusResponse>, pred: F) -> StatusResponse
where
    F: Fn(&StatusResponse) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if pred(&*rx.borrow_and_update()) {
                return rx.borrow().clone();
            }
            rx.changed().await.expect("supervisor dropped");
        }
    })
    .await
    .expect("timed out waiting for status")
}

/// Collect events until none arrives for `quiet`
pub async fn drain_events(rx: &mut broadcast::Receiver<PlayerEvent>, quiet: Duration) -> Vec<PlayerEvent> {
    let mut events = Vec::new();
    while let Ok(Ok(event)) = tokio::time::timeout(quiet, rx.recv()).await {
        events.push(event);
    }
    events
}

/// Wait until `pid` has exited (zombie or gone) without reaping it
pub async fn wait_for_exit(pid: i32) {
    let stat = PathBuf::from(format!("/proc/{}/stat", pid));
    if !Path::new("/proc/self/stat").exists() {
        // No procfs; give the kernel a moment instead
        tokio::time::sleep(Duration::from_millis(50)).await;
        return;
    }
    for _ in 0..200 {
        match fs::read_to_string(&stat) {
            // State is the field after the parenthesised command name
            Ok(text) => {
                let state = text.rsplit(')').next().and_then(|rest| rest.trim().chars().next());
                if matches!(state, Some('Z') | Some('X')) {
                    return;
                }
            }
            Err(_) => return,
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("process {} did not exit", pid);
}
