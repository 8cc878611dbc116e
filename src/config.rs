//! Configuration loading and management
//!
//! Handles parsing of `.davlock.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Name of the configuration file looked up in the working directory
pub const CONFIG_FILE: &str = ".davlock.toml";

/// Environment variable carrying the account password
pub const PASSWORD_ENV: &str = "DAVLOCK_PASSWORD";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server and account configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Lock request configuration
    #[serde(default)]
    pub locks: LocksConfig,

    /// Sync journal configuration
    #[serde(default)]
    pub journal: JournalConfig,
}

/// Server-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the server, e.g. `https://cloud.example.com`
    #[serde(default)]
    pub url: Option<String>,

    /// Account user id
    #[serde(default)]
    pub user: String,

    /// Display name used when the server does not report one
    #[serde(default)]
    pub display_name: String,

    /// Path of the per-user DAV root below the base URL
    #[serde(default = "default_dav_root")]
    pub dav_root: String,

    /// HTTP timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_dav_root() -> String {
    "remote.php/dav/files".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: None,
            user: String::new(),
            display_name: String::new(),
            dav_root: default_dav_root(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Lock-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocksConfig {
    /// Timeout recorded when a lock acknowledgment omits one (seconds)
    #[serde(default = "default_lock_timeout_secs")]
    pub default_timeout_secs: i64,
}

fn default_lock_timeout_secs() -> i64 {
    1800
}

impl Default for LocksConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_lock_timeout_secs(),
        }
    }
}

/// Journal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    /// Directory holding `journal.json`
    #[serde(default = "default_journal_dir")]
    pub dir: PathBuf,
}

fn default_journal_dir() -> PathBuf {
    PathBuf::from(".davlock")
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            dir: default_journal_dir(),
        }
    }
}

impl Config {
    /// Load configuration from a `.davlock.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `dir`, or return defaults
    pub fn load_from_dir(dir: &Path) -> Self {
        let config_path = dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Self::default();
        }

        Self::load(&config_path).unwrap_or_else(|err| {
            tracing::warn!(path = %config_path.display(), error = %err, "ignoring invalid config");
            Self::default()
        })
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Password from the environment, if set
    pub fn password_from_env() -> Option<String> {
        std::env::var(PASSWORD_ENV)
            .ok()
            .filter(|value| !value.is_empty())
    }

    fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.locks.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    fn validate(&self) -> Result<()> {
        if let Some(url) = &self.url {
            url::Url::parse(url).map_err(|err| {
                Error::InvalidConfig(format!("server.url: invalid URL '{url}': {err}"))
            })?;
            if self.user.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "server.user cannot be empty when server.url is set".to_string(),
                ));
            }
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "server.request_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl LocksConfig {
    fn validate(&self) -> Result<()> {
        if self.default_timeout_secs <= 0 {
            return Err(Error::InvalidConfig(
                "locks.default_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
