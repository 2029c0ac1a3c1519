use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{JobwatchError, Result};

/// Global jobwatch configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Remote job API (None = local-only configuration store, no polling)
    #[serde(default)]
    pub api: Option<ApiConfig>,

    /// Default notification target
    #[serde(default)]
    pub default_notify: Option<NotifyTarget>,

    /// Quiet hours - don't send notifications during this time
    #[serde(default)]
    pub quiet_hours: Option<QuietHours>,

    /// Timer settings for the filter watcher
    #[serde(default)]
    pub watcher: WatcherSettings,
}

/// Location of the job API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL, e.g. "http://localhost:8000"
    pub base_url: String,
}

/// Watcher timing, tunable from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherSettings {
    /// Periodic poll interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Coalescing window for job-data change events, in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// How far into the future a reset moves a configuration's start time
    #[serde(default = "default_reset_grace")]
    pub reset_grace_secs: u64,
    /// Title used for aggregated notifications
    #[serde(default = "default_notification_title")]
    pub notification_title: String,
}

fn default_poll_interval() -> u64 {
    300 // 5 minutes
}

fn default_debounce_ms() -> u64 {
    200
}

fn default_reset_grace() -> u64 {
    5
}

fn default_notification_title() -> String {
    "New jobs found".to_string()
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            debounce_ms: default_debounce_ms(),
            reset_grace_secs: default_reset_grace(),
            notification_title: default_notification_title(),
        }
    }
}

/// Quiet hours configuration - suppress notifications during specified time range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuietHours {
    /// Start time in HH:MM format (e.g., "22:00")
    pub start: String,
    /// End time in HH:MM format (e.g., "08:00")
    pub end: String,
}

impl QuietHours {
    /// Check if the current local time is within quiet hours
    pub fn is_quiet_now(&self) -> bool {
        use chrono::{Local, Timelike};

        let now = Local::now();
        self.is_quiet_at(now.hour(), now.minute())
    }

    /// Check a specific wall-clock time against the range
    pub fn is_quiet_at(&self, hour: u32, minute: u32) -> bool {
        use chrono::NaiveTime;

        let Some(current_time) = NaiveTime::from_hms_opt(hour, minute, 0) else {
            return false;
        };
        let (Ok(start), Ok(end)) = (
            NaiveTime::parse_from_str(&self.start, "%H:%M"),
            NaiveTime::parse_from_str(&self.end, "%H:%M"),
        ) else {
            return false;
        };

        // Overnight ranges (e.g., 22:00 to 08:00)
        if start > end {
            current_time >= start || current_time < end
        } else {
            current_time >= start && current_time < end
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifyTarget {
    Command { command: String },
    Ntfy { topic: String, server: Option<String> },
    Slack { webhook_url: String },
    Discord { webhook_url: String },
    Gotify { server: String, token: String },
    /// Telegram Bot API
    Telegram { bot_token: String, chat_id: String },
    /// Pushover notifications
    Pushover { user_key: String, api_token: String },
    /// Matrix messaging
    Matrix {
        homeserver: String,
        room_id: String,
        access_token: String,
    },
}

impl NotifyTarget {
    /// Short name used in logs and `notify show`
    pub fn kind(&self) -> &'static str {
        match self {
            NotifyTarget::Command { .. } => "command",
            NotifyTarget::Ntfy { .. } => "ntfy",
            NotifyTarget::Slack { .. } => "slack",
            NotifyTarget::Discord { .. } => "discord",
            NotifyTarget::Gotify { .. } => "gotify",
            NotifyTarget::Telegram { .. } => "telegram",
            NotifyTarget::Pushover { .. } => "pushover",
            NotifyTarget::Matrix { .. } => "matrix",
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| JobwatchError::ConfigError(e.to_string()))?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// API base URL, honouring the JOBWATCH_API_URL override
    pub fn api_base_url(&self) -> Option<String> {
        if let Ok(url) = std::env::var("JOBWATCH_API_URL") {
            if !url.trim().is_empty() {
                return Some(url);
            }
        }
        self.api.as_ref().map(|api| api.base_url.clone())
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "jobwatch")
            .ok_or_else(|| JobwatchError::ConfigError("Could not determine config directory".into()))?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path
    pub fn data_dir() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "jobwatch")
            .ok_or_else(|| JobwatchError::ConfigError("Could not determine data directory".into()))?;
        Ok(dirs.data_dir().to_path_buf())
    }

    /// Get the database path
    ///
    /// Supports JOBWATCH_DB environment variable for test isolation
    pub fn db_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("JOBWATCH_DB") {
            return Ok(PathBuf::from(path));
        }
        Ok(Self::data_dir()?.join("jobwatch.db"))
    }
}
