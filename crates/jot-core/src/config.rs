use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for the jot application
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory for the local database (defaults to the platform data dir)
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Server URL (if None, runs in local-only mode)
    pub server_url: Option<String>,

    /// Bearer token for the authenticated channel
    pub auth_token: Option<String>,

    /// Seconds between periodic sync passes
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// Timeout for each remote call during a drain
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// Attempts per queue entry within one sync pass before giving up
    /// until the next trigger
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay for exponential retry backoff, in milliseconds
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// How long a deleted note can still be restored with undo
    #[serde(default = "default_undo_window_seconds")]
    pub undo_window_seconds: u64,

    /// Page size for the materialized note feed
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Seconds between connectivity probes
    #[serde(default = "default_probe_interval_seconds")]
    pub probe_interval_seconds: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            server_url: None,
            auth_token: None,
            interval_seconds: default_interval_seconds(),
            request_timeout_seconds: default_request_timeout_seconds(),
            max_attempts: default_max_attempts(),
            retry_base_ms: default_retry_base_ms(),
            undo_window_seconds: default_undo_window_seconds(),
            page_size: default_page_size(),
            probe_interval_seconds: default_probe_interval_seconds(),
        }
    }
}

fn default_interval_seconds() -> u64 {
    30
}

fn default_request_timeout_seconds() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_base_ms() -> u64 {
    500
}

fn default_undo_window_seconds() -> u64 {
    5
}

fn default_page_size() -> u32 {
    20
}

fn default_probe_interval_seconds() -> u64 {
    5
}

impl Config {
    /// Resolve the config file path: `$JOT_CONFIG` if set, otherwise
    /// `<config dir>/jot/config.toml`
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("JOT_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        let base = dirs::config_dir().context("Cannot determine config directory")?;
        Ok(base.join("jot").join("config.toml"))
    }

    /// Load the configuration, falling back to defaults when no file exists
    pub fn load() -> Result<Config> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Config> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let rendered = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, rendered)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Path of the local database file
    pub fn db_path(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.paths.data_dir {
            return Ok(dir.join("jot.db"));
        }
        let base = dirs::data_dir().context("Cannot determine data directory")?;
        Ok(base.join("jot").join("jot.db"))
    }
}
