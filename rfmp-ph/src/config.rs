//! Configuration for the rfmp-ph playback host
//!
//! TOML bootstrap file (`rfmp-ph.toml`), overridable from the command line.
//! Every key has a built-in default.
//!
//! ```toml
//! port = 5781
//! root_folder = "/Volumes/music"
//!
//! [player]
//! program = "mpv"
//! args = ["--no-video", "--shuffle", "--loop-playlist=inf", "--volume=80"]
//! audio_extension = "mp3"
//! grace_period_ms = 5000
//!
//! [logging]
//! level = "info"
//! ```

use rfmp_common::config::LoggingConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable consulted for the root folder
pub const ROOT_FOLDER_ENV: &str = "RFMP_PH_ROOT_FOLDER";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Music root; relative play directories resolve against it
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub player: PlayerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            root_folder: None,
            player: PlayerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// External player process configuration
///
/// The player is launched as `program args... file1 file2 ...` with every
/// matching audio file directly under the requested directory appended.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments placed before the file list (shuffle, no video, ...)
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Extension of playable files, without the dot (case-insensitive)
    #[serde(default = "default_audio_extension")]
    pub audio_extension: String,

    /// How long a stopping player may take to exit before it is killed
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
}

impl PlayerConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            audio_extension: default_audio_extension(),
            grace_period_ms: default_grace_period_ms(),
        }
    }
}

fn default_port() -> u16 {
    5781
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_program() -> String {
    "mpv".to_string()
}

fn default_args() -> Vec<String> {
    vec![
        "--no-video".to_string(),
        "--shuffle".to_string(),
        "--loop-playlist=inf".to_string(),
        "--volume=80".to_string(),
    ]
}

fn default_audio_extension() -> String {
    "mp3".to_string()
}

fn default_grace_period_ms() -> u64 {
    5000
}
