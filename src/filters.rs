use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// A saved, named filter preset for the job list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilterConfiguration {
    /// Server-side identity (None = saved locally only, cannot be polled)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Unique display name
    pub name: String,
    /// Opaque filter/sort state of the job list
    #[serde(default)]
    pub filters: serde_json::Value,
    /// Send a notification when new matches appear
    #[serde(default)]
    pub notify: bool,
    /// Include in polling (default: true)
    #[serde(default = "default_true")]
    pub watched: bool,
    /// Ordering in lists (lower first)
    #[serde(default)]
    pub position: i64,
    /// Last local modification
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl FilterConfiguration {
    /// Create a local configuration with defaults
    pub fn new(name: impl Into<String>, filters: serde_json::Value) -> Self {
        Self {
            id: None,
            name: name.into(),
            filters,
            notify: false,
            watched: true,
            position: 0,
            updated_at: Utc::now(),
        }
    }

    /// The slice of this configuration the watcher engine needs
    pub fn tracked(&self) -> TrackedConfiguration {
        TrackedConfiguration {
            id: self.id,
            name: self.name.clone(),
            notify: self.notify,
            watched: self.watched,
        }
    }
}

/// A filter configuration as seen by the watcher engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackedConfiguration {
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub notify: bool,
    #[serde(default = "default_true")]
    pub watched: bool,
}

impl TrackedConfiguration {
    pub fn new(id: Option<i64>, name: impl Into<String>, notify: bool) -> Self {
        Self { id, name: name.into(), notify, watched: true }
    }

    /// Eligible for polling: has a server id and is not explicitly unwatched
    pub fn is_tracked(&self) -> bool {
        self.id.is_some() && self.watched
    }
}

/// Per-configuration outcome of the latest check
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct WatcherResult {
    pub total: u64,
    pub new_items: u64,
}

/// Stats returned by the job API for one configuration id
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigStats {
    pub total: u64,
    pub new_items: u64,
}

/// Server clock description
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SystemTimezone {
    pub offset_minutes: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watched_defaults_to_true() {
        let config: FilterConfiguration =
            serde_json::from_str(r#"{"name": "Remote Rust", "filters": {"q": "rust"}}"#).unwrap();
        assert!(config.watched);
        assert!(!config.notify);
        assert!(config.id.is_none());
    }

    #[test]
    fn test_is_tracked() {
        let mut config = TrackedConfiguration::new(Some(3), "Backend", true);
        assert!(config.is_tracked());

        config.watched = false;
        assert!(!config.is_tracked());

        let local = TrackedConfiguration::new(None, "Local only", true);
        assert!(!local.is_tracked());
    }

    #[test]
    fn test_stats_wire_shape() {
        let stats: std::collections::HashMap<i64, ConfigStats> =
            serde_json::from_str(r#"{"1": {"total": 10, "new_items": 2}}"#).unwrap();
        assert_eq!(stats[&1], ConfigStats { total: 10, new_items: 2 });
    }
}
