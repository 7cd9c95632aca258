//! Configuration stored in `~/.ledger/config.json`.
//!
//! Every field has a default, so a missing file or a partial file is fine.
//! Secrets can come from the environment instead of the file.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound for every day-valued alert setting (about a century).
pub const MAX_SETTING_DAYS: i64 = 36_500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not find home directory")]
    HomeDirNotFound,

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// SQLite file. Defaults to `~/.ledger/ledger.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub alerts: AlertSettings,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// OpenAI-compatible chat completions endpoint used for extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            api_key: None,
        }
    }
}

/// Thresholds for the alert rules and recurrence detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSettings {
    /// Days an owned item may stay unacknowledged before it is flagged.
    #[serde(default = "default_ack_grace_days")]
    pub ack_grace_days: i64,
    /// How far back the owner's meetings are searched for recurring risks.
    #[serde(default = "default_recurrence_window_days")]
    pub recurrence_window_days: i64,
    /// Shared meaningful words for two risks to count as the same issue.
    #[serde(default = "default_recurrence_min_overlap")]
    pub recurrence_min_overlap: usize,
    /// Matching historical risks needed before a risk counts as recurring.
    #[serde(default = "default_recurrence_min_matches")]
    pub recurrence_min_matches: usize,
    /// Due-date reminders cover items due within this many days (and overdue).
    #[serde(default = "default_reminder_horizon_days")]
    pub reminder_horizon_days: i64,
}

fn default_ack_grace_days() -> i64 {
    2
}

fn default_recurrence_window_days() -> i64 {
    30
}

fn default_recurrence_min_overlap() -> usize {
    3
}

fn default_recurrence_min_matches() -> usize {
    2
}

fn default_reminder_horizon_days() -> i64 {
    1
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            ack_grace_days: default_ack_grace_days(),
            recurrence_window_days: default_recurrence_window_days(),
            recurrence_min_overlap: default_recurrence_min_overlap(),
            recurrence_min_matches: default_recurrence_min_matches(),
            reminder_horizon_days: default_reminder_horizon_days(),
        }
    }
}

impl AlertSettings {
    pub fn ack_grace(&self) -> Duration {
        clamped_days(self.ack_grace_days)
    }

    pub fn recurrence_window(&self) -> Duration {
        clamped_days(self.recurrence_window_days)
    }

    /// Reminder horizon in whole days, within `0..=MAX_SETTING_DAYS`.
    pub fn reminder_horizon(&self) -> i64 {
        self.reminder_horizon_days.clamp(0, MAX_SETTING_DAYS)
    }
}

/// Negative values count as zero and oversized ones as [`MAX_SETTING_DAYS`].
fn clamped_days(days: i64) -> Duration {
    Duration::days(days.clamp(0, MAX_SETTING_DAYS))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationConfig {
    /// Slack incoming webhook. Alerts are only logged when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_webhook_url: Option<String>,
}

impl Config {
    /// Apply environment overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.generation.api_key = Some(key);
        }
        if let Some(url) = lookup("SLACK_WEBHOOK_URL").filter(|u| !u.trim().is_empty()) {
            self.notifications.slack_webhook_url = Some(url);
        }
        if let Some(path) = lookup("LEDGER_DB").filter(|p| !p.trim().is_empty()) {
            self.database_path = Some(PathBuf::from(path));
        }
    }
}

/// Get the canonical config file path (`~/.ledger/config.json`)
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeDirNotFound)?;
    Ok(home.join(".ledger").join("config.json"))
}

/// Load configuration from an explicit file. A missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        log::debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load `~/.ledger/config.json` (or `path` when given) and apply env overrides.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };
    let mut config = load_config_from(&path)?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(config)
}
