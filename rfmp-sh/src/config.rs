//! Configuration for the rfmp-sh scan host
//!
//! TOML bootstrap file (`rfmp-sh.toml`), overridable from the command line.
//! Every key has a built-in default.
//!
//! ```toml
//! port = 5780
//! root_folder = "/var/lib/rfmp"
//!
//! [scan]
//! source = "auto"            # stdin | device | auto
//! inactivity_ms = 300
//! cooldown_ms = 1500
//!
//! [dispatch]
//! endpoint = "http://192.168.1.20:5781"
//! timeout_ms = 3000
//! max_retries = 2
//! backoff_ms = 250
//!
//! [logging]
//! level = "info"
//! ```

use rfmp_common::config::LoggingConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable consulted for the root folder
pub const ROOT_FOLDER_ENV: &str = "RFMP_SH_ROOT_FOLDER";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Folder holding `rfmp.db`
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            root_folder: None,
            scan: ScanConfig::default(),
            dispatch: DispatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Where scan characters come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScanSource {
    /// Line-oriented standard input (reader acting as a keyboard on a tty)
    Stdin,
    /// Linux input event device
    Device,
    /// Detect the reader device, fall back to standard input
    #[default]
    Auto,
}

/// Scan capture, debounce and hand-off parameters
#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub source: ScanSource,

    /// Explicit input device, e.g. `/dev/input/event3`
    #[serde(default)]
    pub device: Option<PathBuf>,

    /// Case-insensitive patterns matched against `/proc/bus/input/devices`
    #[serde(default = "default_device_patterns")]
    pub device_patterns: Vec<String>,

    /// A partial buffer idle for this long is discarded
    #[serde(default = "default_inactivity_ms")]
    pub inactivity_ms: u64,

    /// Repeats of the same card within this window are suppressed
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    #[serde(default = "default_min_card_len")]
    pub min_card_len: usize,

    #[serde(default = "default_max_card_len")]
    pub max_card_len: usize,

    /// Capacity of the capture → worker hand-off queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl ScanConfig {
    pub fn inactivity(&self) -> Duration {
        Duration::from_millis(self.inactivity_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            source: ScanSource::default(),
            device: None,
            device_patterns: default_device_patterns(),
            inactivity_ms: default_inactivity_ms(),
            cooldown_ms: default_cooldown_ms(),
            min_card_len: default_min_card_len(),
            max_card_len: default_max_card_len(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Dispatch client parameters
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Base URL of the playback host
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Per-attempt request timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retries after the first attempt, transient failures only
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Linear backoff step: retry n waits n × backoff
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl DispatchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_port() -> u16 {
    5780
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_device_patterns() -> Vec<String> {
    ["RFID", "Card Reader", "05fe:1010", "OKE Electron", "Chic Technology"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_inactivity_ms() -> u64 {
    300
}

fn default_cooldown_ms() -> u64 {
    1500
}

fn default_min_card_len() -> usize {
    1
}

fn default_max_card_len() -> usize {
    20
}

fn default_queue_capacity() -> usize {
    4
}

fn default_endpoint() -> String {
    "http://127.0.0.1:5781".to_string()
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    250
}
