//! Autodial configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AutodialError, Result, SchedulerError};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AutodialConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub dialer: DialerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl AutodialConfig {
    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AutodialError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| AutodialError::Config(format!("Failed to parse config: {e}")))?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AutodialError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the autodial home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".autodial")
    }

    /// Reject values the scheduler cannot run with.
    pub fn validate(&self) -> std::result::Result<(), SchedulerError> {
        self.scheduler.validate()
    }
}

/// Dialing cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Delay between an annotation and the next call.
    #[serde(default = "default_dial_interval_ms")]
    pub dial_interval_ms: i64,
    /// Every Nth completed call requires operator confirmation.
    #[serde(default = "default_milestone_size")]
    pub milestone_size: i64,
}

fn default_dial_interval_ms() -> i64 { 5000 }
fn default_milestone_size() -> i64 { 30 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            dial_interval_ms: default_dial_interval_ms(),
            milestone_size: default_milestone_size(),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> std::result::Result<(), SchedulerError> {
        positive("dial_interval_ms", self.dial_interval_ms)?;
        positive("milestone_size", self.milestone_size)?;
        Ok(())
    }
}

/// Parse a strictly positive setting.
pub fn positive(name: &str, value: i64) -> std::result::Result<u64, SchedulerError> {
    if value <= 0 {
        return Err(SchedulerError::InvalidConfiguration(format!(
            "{name} must be > 0, got {value}"
        )));
    }
    Ok(value as u64)
}

/// External program used to place calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialerConfig {
    /// Program to run per call. None means dry-run (log only).
    #[serde(default)]
    pub command: Option<String>,
    /// Arguments; `{number}` is replaced with the dialed number.
    #[serde(default = "default_dialer_args")]
    pub args: Vec<String>,
}

fn default_dialer_args() -> Vec<String> { vec!["{number}".into()] }

impl Default for DialerConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: default_dialer_args(),
        }
    }
}

/// Where call lists and stats live on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String { "~/.autodial".into() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: default_data_dir() }
    }
}

impl StorageConfig {
    /// Data directory with `~` expanded.
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).to_string())
    }

    pub fn stats_db_path(&self) -> PathBuf {
        self.data_dir().join("stats.db")
    }
}

/// Remote mirror of batches and call events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default = "default_sync_timeout")]
    pub timeout_secs: u64,
}

fn default_sync_timeout() -> u64 { 10 }

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: String::new(),
            headers: Vec::new(),
            timeout_secs: default_sync_timeout(),
        }
    }
}
