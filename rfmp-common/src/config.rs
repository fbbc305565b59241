//! Bootstrap configuration loading and root folder resolution
//!
//! Each RFMP service reads a small TOML bootstrap file. Missing files and
//! missing keys are never fatal: the service logs a warning and falls back
//! to built-in defaults (`#[serde(default)]` on every field).
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. The module's environment variable (`RFMP_SH_ROOT_FOLDER`,
//!    `RFMP_PH_ROOT_FOLDER`)
//! 3. TOML `root_folder` key
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Logging configuration shared by every service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolve the root folder following the priority order above
///
/// Each module passes its own `env_var_name`: the scan host's root holds the
/// mapping database, the playback host's is the music mount, and both may
/// run on one machine.
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_value: Option<&Path>,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = toml_value {
        return path.to_path_buf();
    }

    default_root_folder()
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/rfmp (or /var/lib/rfmp for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("rfmp"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/rfmp"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/rfmp
        dirs::data_dir()
            .map(|d| d.join("rfmp"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/rfmp"))
    } else {
        dirs::data_local_dir()
            .map(|d| d.join("rfmp"))
            .unwrap_or_else(|| PathBuf::from("./rfmp_data"))
    }
}

/// Locate the default config file for a module
///
/// Checks `~/.config/rfmp/<module>.toml` first, then `/etc/rfmp/<module>.toml`.
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    let file_name = format!("{}.toml", module_name);

    let user_config = dirs::config_dir().map(|d| d.join("rfmp").join(&file_name));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/rfmp").join(&file_name);
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Load a TOML bootstrap file into `T`
///
/// - An explicitly requested file that does not exist is an error.
/// - With no explicit path, the default locations are searched; if none
///   exists the built-in defaults are returned with a warning.
/// - A file that exists but does not parse is always an error.
pub fn load_toml<T>(explicit: Option<&Path>, module_name: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => match default_config_path(module_name) {
            Some(path) => path,
            None => {
                warn!(
                    "No config file found for {}, using built-in defaults",
                    module_name
                );
                return Ok(T::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)?;
    let config = parse_toml(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Parse TOML text into `T`
pub fn parse_toml<T: DeserializeOwned>(content: &str) -> std::result::Result<T, toml::de::Error> {
    toml::from_str(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Sample {
        #[serde(default)]
        port: u16,
        #[serde(default)]
        logging: LoggingConfig,
    }

    #[test]
    fn test_logging_defaults_to_info() {
        let sample: Sample = parse_toml("port = 10").unwrap();
        assert_eq!(sample.port, 10);
        assert_eq!(sample.logging.level, "info");
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let result: Result<Sample> =
            load_toml(Some(Path::new("/nonexistent/rfmp/test.toml")), "test");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.toml");
        std::fs::write(&path, "port = 4242\n[logging]\nlevel = \"debug\"\n").unwrap();

        let sample: Sample = load_toml(Some(&path), "test").unwrap();
        assert_eq!(sample.port, 4242);
        assert_eq!(sample.logging.level, "debug");
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "port = \"not a number\"").unwrap();

        let result: Result<Sample> = load_toml(Some(&path), "test");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_default_root_folder_is_not_empty() {
        assert!(!default_root_folder().as_os_str().is_empty());
    }
}
