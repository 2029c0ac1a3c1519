//! Contracts for everything the filter watcher talks to.
//!
//! The engine only sees these traits; `api`, `db`, `notify` and `events` provide the
//! production implementations and tests substitute in-memory ones.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::filters::{ConfigStats, SystemTimezone};

/// Key under which the last successful check time is persisted
pub const LAST_CHECK_KEY: &str = "filter_watcher.last_check_time";

/// Per-configuration counts since a cutoff
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// `cutoffs` maps configuration id to a naive server-local timestamp. Ids the
    /// source has no data for are simply absent from the reply.
    async fn watcher_stats(&self, cutoffs: &BTreeMap<i64, String>) -> Result<HashMap<i64, ConfigStats>>;
}

#[async_trait]
pub trait TimezoneSource: Send + Sync {
    async fn system_timezone(&self) -> Result<SystemTimezone>;
}

/// Small persistent key/value store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_value(&self, key: &str) -> Result<Option<String>>;
    async fn set_value(&self, key: &str, value: &str) -> Result<()>;
}

/// Read a JSON-encoded value from a key/value store
pub async fn get_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    match store.get_value(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Write a value to a key/value store as JSON
pub async fn set_json<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set_value(key, &raw).await
}

/// Desktop-style notification delivery
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Ask for permission to deliver; returns whether it is granted
    async fn request_permission(&self) -> bool;

    fn has_permission(&self) -> bool;

    /// Deliver a notification. A no-op when permission has not been granted.
    async fn notify(&self, title: &str, body: &str) -> Result<()>;
}

/// Callback invoked for every job-data change event
pub type ChangeListener = Arc<dyn Fn(&crate::events::ChangeEvent) + Send + Sync>;

/// Source of "job data changed" events
pub trait ChangeFeed: Send + Sync {
    fn subscribe(&self, listener: ChangeListener) -> Subscription;
}

/// Live subscription to a [`ChangeFeed`]; dropping it unsubscribes
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self { cancel: Some(Box::new(cancel)) }
    }

    /// Unsubscribe now instead of at drop
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
