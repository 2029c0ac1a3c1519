//! Configuration store against a fake job API and an in-memory database

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use jobwatch::api::ConfigApi;
use jobwatch::db::{Database, LocalStore};
use jobwatch::filters::FilterConfiguration;
use jobwatch::store::ConfigStore;
use jobwatch::{JobwatchError, Result};

#[derive(Default)]
struct FakeApi {
    configs: Mutex<Vec<FilterConfiguration>>,
    next_id: AtomicI64,
    offline: AtomicBool,
    reorders: Mutex<Vec<Vec<i64>>>,
}

impl FakeApi {
    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(JobwatchError::ApiError("connection refused".into()))
        } else {
            Ok(())
        }
    }

    fn names(&self) -> Vec<String> {
        self.configs.lock().unwrap().iter().map(|c| c.name.clone()).collect()
    }
}

#[async_trait]
impl ConfigApi for FakeApi {
    async fn list(&self) -> Result<Vec<FilterConfiguration>> {
        self.check_online()?;
        Ok(self.configs.lock().unwrap().clone())
    }

    async fn save(&self, config: &FilterConfiguration) -> Result<FilterConfiguration> {
        self.check_online()?;
        let mut saved = config.clone();
        if saved.id.is_none() {
            saved.id = Some(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        }
        let mut configs = self.configs.lock().unwrap();
        match configs.iter_mut().find(|c| c.name == saved.name) {
            Some(existing) => *existing = saved.clone(),
            None => configs.push(saved.clone()),
        }
        Ok(saved)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.check_online()?;
        self.configs.lock().unwrap().retain(|c| c.id != Some(id));
        Ok(())
    }

    async fn reorder(&self, ids: &[i64]) -> Result<()> {
        self.check_online()?;
        self.reorders.lock().unwrap().push(ids.to_vec());
        let mut configs = self.configs.lock().unwrap();
        configs.sort_by_key(|c| c.id.and_then(|id| ids.iter().position(|x| *x == id)).unwrap_or(usize::MAX));
        Ok(())
    }
}

fn store_with_api() -> (ConfigStore, Arc<FakeApi>) {
    let api = Arc::new(FakeApi::default());
    let local = LocalStore::new(Database::open_in_memory().unwrap());
    (ConfigStore::new(Some(api.clone() as Arc<dyn ConfigApi>), local), api)
}

#[tokio::test]
async fn test_saved_configs_get_server_ids() {
    let (store, api) = store_with_api();
    let saved = store.save(FilterConfiguration::new("Rust", json!({"q": "rust"}))).await.unwrap();
    assert_eq!(saved.id, Some(1));

    let tracked = store.tracked().await.unwrap();
    assert_eq!(tracked.len(), 1);
    assert!(tracked[0].is_tracked());
    assert_eq!(api.names(), vec!["Rust"]);
}

#[tokio::test]
async fn test_offline_api_falls_back_to_local_copy() {
    let (store, api) = store_with_api();
    store.save(FilterConfiguration::new("Rust", json!({}))).await.unwrap();
    store.save(FilterConfiguration::new("Go", json!({}))).await.unwrap();

    api.offline.store(true, Ordering::SeqCst);
    let names: Vec<_> = store.list().await.unwrap().into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["Rust", "Go"]);

    // Saving while offline still lands locally, without an id
    let draft = store.save(FilterConfiguration::new("Python", json!({}))).await.unwrap();
    assert_eq!(draft.id, None);
    assert_eq!(store.list().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_remote_deletions_are_mirrored() {
    let (store, api) = store_with_api();
    store.save(FilterConfiguration::new("Rust", json!({}))).await.unwrap();
    store.save(FilterConfiguration::new("Go", json!({}))).await.unwrap();

    api.configs.lock().unwrap().retain(|c| c.name != "Go");
    let names: Vec<_> = store.list().await.unwrap().into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["Rust"]);
}

#[tokio::test]
async fn test_delete_removes_remote_and_local() {
    let (store, api) = store_with_api();
    store.save(FilterConfiguration::new("Rust", json!({}))).await.unwrap();

    store.delete("Rust").await.unwrap();
    assert!(api.names().is_empty());
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reorder_sends_ids_in_new_order() {
    let (store, api) = store_with_api();
    for name in ["A", "B", "C"] {
        store.save(FilterConfiguration::new(name, json!({}))).await.unwrap();
    }

    let reordered = store.reorder(&["C".to_string(), "A".to_string()]).await.unwrap();
    let names: Vec<_> = reordered.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["C", "A", "B"]);
    assert_eq!(api.reorders.lock().unwrap().last().unwrap(), &vec![3, 1, 2]);

    // The server now agrees, so a fresh listing keeps the order
    let names: Vec<_> = store.list().await.unwrap().into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["C", "A", "B"]);
}

#[tokio::test]
async fn test_reorder_unknown_name_fails() {
    let (store, _api) = store_with_api();
    store.save(FilterConfiguration::new("A", json!({}))).await.unwrap();
    let err = store.reorder(&["Z".to_string()]).await.unwrap_err();
    assert!(matches!(err, JobwatchError::ConfigNotFound(name) if name == "Z"));
}

#[tokio::test]
async fn test_set_flags_round_trips_through_api() {
    let (store, api) = store_with_api();
    store.save(FilterConfiguration::new("Rust", json!({}))).await.unwrap();

    let updated = store.set_flags("Rust", Some(true), Some(false)).await.unwrap();
    assert!(updated.notify);
    assert!(!updated.watched);
    assert_eq!(updated.id, Some(1));

    let remote = api.configs.lock().unwrap()[0].clone();
    assert!(remote.notify);
    assert!(!remote.watched);
}
