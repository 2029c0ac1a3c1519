//! Named filter configurations: remote API first, local database as fallback and mirror.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::api::ConfigApi;
use crate::db::LocalStore;
use crate::error::{JobwatchError, Result};
use crate::filters::{FilterConfiguration, TrackedConfiguration};

/// Outcome of an import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: Vec<String>,
    pub skipped: Vec<String>,
}

#[derive(Clone)]
pub struct ConfigStore {
    remote: Option<Arc<dyn ConfigApi>>,
    local: LocalStore,
}

impl ConfigStore {
    pub fn new(remote: Option<Arc<dyn ConfigApi>>, local: LocalStore) -> Self {
        Self { remote, local }
    }

    /// Local-only store (no API configured)
    pub fn local_only(local: LocalStore) -> Self {
        Self::new(None, local)
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// All configurations in display order
    pub async fn list(&self) -> Result<Vec<FilterConfiguration>> {
        if let Some(remote) = &self.remote {
            match remote.list().await {
                Ok(mut configs) => {
                    for (position, config) in configs.iter_mut().enumerate() {
                        config.position = position as i64;
                    }
                    let mirror = configs.clone();
                    self.local.run(move |db| db.replace_remote_configs(&mirror)).await?;
                    debug!(count = configs.len(), "Refreshed filter configurations from API");
                }
                Err(e) => warn!(error = %e, "Could not list filter configurations from API, using local copy"),
            }
        }
        self.local.run(|db| db.list_configs()).await
    }

    /// Configurations as the watcher engine sees them
    pub async fn tracked(&self) -> Result<Vec<TrackedConfiguration>> {
        Ok(self.list().await?.iter().map(FilterConfiguration::tracked).collect())
    }

    pub async fn load(&self, name: &str) -> Result<Option<FilterConfiguration>> {
        Ok(self.list().await?.into_iter().find(|c| c.name == name))
    }

    async fn require(&self, name: &str) -> Result<FilterConfiguration> {
        self.load(name)
            .await?
            .ok_or_else(|| JobwatchError::ConfigNotFound(name.to_string()))
    }

    /// Save (create or overwrite by name) a configuration
    pub async fn save(&self, mut config: FilterConfiguration) -> Result<FilterConfiguration> {
        if config.name.trim().is_empty() {
            return Err(JobwatchError::ConfigError("Configuration name cannot be empty".into()));
        }

        let name = config.name.clone();
        let existing = self.local.run(move |db| db.get_config(&name)).await?;
        match existing {
            Some(existing) => {
                config.position = existing.position;
                if config.id.is_none() {
                    config.id = existing.id;
                }
            }
            None => config.position = self.local.run(|db| db.next_position()).await?,
        }
        config.updated_at = Utc::now();

        if let Some(remote) = &self.remote {
            match remote.save(&config).await {
                Ok(saved) => {
                    config.id = saved.id;
                }
                Err(e) => warn!(config = %config.name, error = %e, "Could not save filter configuration to API, saved locally"),
            }
        }

        let stored = config.clone();
        self.local.run(move |db| db.upsert_config(&stored)).await?;
        Ok(config)
    }

    /// Delete a configuration by name
    pub async fn delete(&self, name: &str) -> Result<()> {
        let config = self.require(name).await?;

        if let (Some(remote), Some(id)) = (&self.remote, config.id) {
            if let Err(e) = remote.delete(id).await {
                warn!(config = name, error = %e, "Could not delete filter configuration from API");
            }
        }

        let name = name.to_string();
        self.local.run(move |db| db.delete_config(&name)).await?;
        Ok(())
    }

    /// Put `names` first, in order; every name must exist
    pub async fn reorder(&self, names: &[String]) -> Result<Vec<FilterConfiguration>> {
        let configs = self.list().await?;
        let known: HashSet<&str> = configs.iter().map(|c| c.name.as_str()).collect();
        if let Some(missing) = names.iter().find(|n| !known.contains(n.as_str())) {
            return Err(JobwatchError::ConfigNotFound(missing.clone()));
        }

        let ordered = names.to_vec();
        self.local.run(move |db| db.set_positions(&ordered)).await?;
        let reordered = self.local.run(|db| db.list_configs()).await?;

        if let Some(remote) = &self.remote {
            let ids: Vec<i64> = reordered.iter().filter_map(|c| c.id).collect();
            if let Err(e) = remote.reorder(&ids).await {
                warn!(error = %e, "Could not reorder filter configurations on API");
            }
        }
        Ok(reordered)
    }

    /// Toggle the notify/watched flags of an existing configuration
    pub async fn set_flags(
        &self,
        name: &str,
        notify: Option<bool>,
        watched: Option<bool>,
    ) -> Result<FilterConfiguration> {
        let mut config = self.require(name).await?;
        if let Some(notify) = notify {
            config.notify = notify;
        }
        if let Some(watched) = watched {
            config.watched = watched;
        }
        self.save(config).await
    }

    /// Pretty JSON for one configuration or all of them
    pub async fn export(&self, name: Option<&str>) -> Result<String> {
        let configs = match name {
            Some(name) => vec![self.require(name).await?],
            None => self.list().await?,
        };
        Ok(serde_json::to_string_pretty(&configs)?)
    }

    /// Import configurations exported by [`ConfigStore::export`]. Existing names are
    /// skipped and imported entries lose their server ids.
    pub async fn import(&self, json: &str, dry_run: bool) -> Result<ImportSummary> {
        let incoming: Vec<FilterConfiguration> = serde_json::from_str(json)
            .map_err(|e| JobwatchError::ConfigError(format!("Invalid JSON: {}", e)))?;

        let existing: HashSet<String> = self.list().await?.into_iter().map(|c| c.name).collect();
        let mut summary = ImportSummary::default();

        for mut config in incoming {
            if existing.contains(&config.name) || summary.imported.contains(&config.name) {
                summary.skipped.push(config.name);
                continue;
            }
            summary.imported.push(config.name.clone());
            if !dry_run {
                config.id = None;
                self.save(config).await?;
            }
        }
        Ok(summary)
    }
}
