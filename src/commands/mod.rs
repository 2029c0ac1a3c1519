//! Command implementations for the jobwatch CLI

mod configs;
mod daemon;
mod misc;
mod notify;
mod status;

pub use configs::*;
pub use daemon::*;
pub use misc::*;
pub use notify::*;
pub use status::*;

use std::sync::Arc;

use jobwatch::api::{ApiClient, ConfigApi};
use jobwatch::config::Config;
use jobwatch::db::{Database, LocalStore};
use jobwatch::error::{JobwatchError, Result};
use jobwatch::store::ConfigStore;

/// Client for the configured job API, if any
fn api_client(config: &Config) -> Result<Option<Arc<ApiClient>>> {
    config
        .api_base_url()
        .map(|url| ApiClient::new(&url).map(Arc::new))
        .transpose()
}

fn require_api_client(config: &Config) -> Result<Arc<ApiClient>> {
    api_client(config)?.ok_or_else(|| {
        JobwatchError::ConfigError(
            "No job API configured. Set JOBWATCH_API_URL or add [api] base_url to config.toml".into(),
        )
    })
}

fn store_with(client: Option<Arc<ApiClient>>, local: LocalStore) -> ConfigStore {
    match client {
        Some(client) => ConfigStore::new(Some(client as Arc<dyn ConfigApi>), local),
        None => ConfigStore::local_only(local),
    }
}

/// Configuration store for one-shot commands
fn open_store() -> Result<ConfigStore> {
    let config = Config::load()?;
    let local = LocalStore::new(Database::open()?);
    Ok(store_with(api_client(&config)?, local))
}
