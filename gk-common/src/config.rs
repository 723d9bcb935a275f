//! Bootstrap configuration loading
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority, handled by the binary)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error: the service continues on
//! environment variables and defaults.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Directory name used under the platform config/data folders
pub const APP_DIR_NAME: &str = "gatekeeper";

/// Default HTTP ingress port
pub const DEFAULT_LISTEN_PORT: u16 = 5790;

/// Bootstrap configuration loaded from TOML file
///
/// Static for the life of the process; restart to pick up changes.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    /// Path to the SQLite attempt ledger
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// HTTP ingress port
    #[serde(default)]
    pub listen_port: Option<u16>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Service-specific table, interpreted by the binary
    #[serde(default)]
    pub bot: toml::Table,
}

/// Logging configuration
///
/// `RUST_LOG` still takes precedence when set.
#[derive(Debug, Clone, Deserialize)]
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

impl TomlConfig {
    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Read and parse a TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Locate the config file to use
    ///
    /// An explicit path is always returned as-is (reading it may still
    /// fail). Otherwise the first existing platform default is returned:
    /// `~/.config/gatekeeper/config.toml`, then (Linux)
    /// `/etc/gatekeeper/config.toml`.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        let user_config = dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.toml"));
        if let Some(path) = user_config {
            if path.exists() {
                return Some(path);
            }
        }

        if cfg!(target_os = "linux") {
            let system_config = PathBuf::from("/etc").join(APP_DIR_NAME).join("config.toml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Database path: TOML value or the OS-dependent default
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(default_database_path)
    }

    /// Listen port: TOML value or the compiled default
    pub fn resolved_listen_port(&self) -> u16 {
        self.listen_port.unwrap_or(DEFAULT_LISTEN_PORT)
    }
}

/// OS-dependent default ledger location
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("./gatekeeper_data"))
        .join("quiz_attempts.db")
}

/// Read an environment variable, treating empty values as unset
pub fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
