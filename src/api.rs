//! Blocking HTTP client for the job API, exposed through the async collaborator traits.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{JobwatchError, Result};
use crate::filters::{ConfigStats, FilterConfiguration, SystemTimezone};
use crate::sources::{StatsSource, TimezoneSource};

/// Default HTTP request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Remote CRUD for filter configurations
#[async_trait]
pub trait ConfigApi: Send + Sync {
    async fn list(&self) -> Result<Vec<FilterConfiguration>>;
    /// Create or update; the returned value carries the server id
    async fn save(&self, config: &FilterConfiguration) -> Result<FilterConfiguration>;
    async fn delete(&self, id: i64) -> Result<()>;
    async fn reorder(&self, ids: &[i64]) -> Result<()>;
}

#[derive(Serialize)]
struct ReorderRequest<'a> {
    ids: &'a [i64],
}

/// Client for the job API
#[derive(Clone)]
pub struct ApiClient {
    base_url: url::Url,
    agent: ureq::Agent,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url = url::Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)))
            .build()
            .into();
        Ok(Self { base_url, agent })
    }

    pub fn base_url(&self) -> &url::Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<String> {
        Ok(self.base_url.join(path)?.to_string())
    }

    async fn get_json<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let url = self.endpoint(path)?;
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || -> Result<T> {
            let mut response = agent.get(&url).call()?;
            Ok(response.body_mut().read_json::<T>()?)
        })
        .await?
    }

    async fn send_json<B, T>(&self, method: &'static str, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + Send + 'static,
    {
        let url = self.endpoint(path)?;
        let body = serde_json::to_value(body)?;
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || -> Result<T> {
            let mut response = match method {
                "POST" => agent.post(&url).send_json(&body)?,
                "PUT" => agent.put(&url).send_json(&body)?,
                other => return Err(JobwatchError::ApiError(format!("unsupported method {}", other))),
            };
            Ok(response.body_mut().read_json::<T>()?)
        })
        .await?
    }

    async fn send_no_content<B>(&self, method: &'static str, path: &str, body: Option<&B>) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(path)?;
        let body = body.map(serde_json::to_value).transpose()?;
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            match (method, body) {
                ("DELETE", _) => {
                    agent.delete(&url).call()?;
                }
                ("PUT", Some(body)) => {
                    agent.put(&url).send_json(&body)?;
                }
                (other, _) => {
                    return Err(JobwatchError::ApiError(format!("unsupported method {}", other)));
                }
            }
            Ok(())
        })
        .await?
    }
}

/// Stringify integer keys the way JSON object keys are sent on the wire
fn cutoff_body(cutoffs: &BTreeMap<i64, String>) -> BTreeMap<String, &str> {
    cutoffs.iter().map(|(id, cutoff)| (id.to_string(), cutoff.as_str())).collect()
}

#[async_trait]
impl StatsSource for ApiClient {
    async fn watcher_stats(&self, cutoffs: &BTreeMap<i64, String>) -> Result<HashMap<i64, ConfigStats>> {
        if cutoffs.is_empty() {
            return Ok(HashMap::new());
        }
        self.send_json("POST", "api/filter-configs/watcher-stats", &cutoff_body(cutoffs)).await
    }
}

#[async_trait]
impl TimezoneSource for ApiClient {
    async fn system_timezone(&self) -> Result<SystemTimezone> {
        self.get_json("api/system/timezone").await
    }
}

#[async_trait]
impl ConfigApi for ApiClient {
    async fn list(&self) -> Result<Vec<FilterConfiguration>> {
        self.get_json("api/filter-configs").await
    }

    async fn save(&self, config: &FilterConfiguration) -> Result<FilterConfiguration> {
        self.send_json("POST", "api/filter-configs", config).await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.send_no_content::<()>("DELETE", &format!("api/filter-configs/{}", id), None).await
    }

    async fn reorder(&self, ids: &[i64]) -> Result<()> {
        self.send_no_content("PUT", "api/filter-configs/reorder", Some(&ReorderRequest { ids })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = ApiClient::new("http://localhost:8000/jobs").unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:8000/jobs/");
        assert_eq!(
            client.endpoint("api/system/timezone").unwrap(),
            "http://localhost:8000/jobs/api/system/timezone"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(ApiClient::new("not a url"), Err(JobwatchError::UrlParseError(_))));
    }

    #[test]
    fn test_cutoff_body_uses_string_keys() {
        let mut cutoffs = BTreeMap::new();
        cutoffs.insert(2, "2024-03-10T12:00:00.000".to_string());
        let json = serde_json::to_string(&cutoff_body(&cutoffs)).unwrap();
        assert_eq!(json, r#"{"2":"2024-03-10T12:00:00.000"}"#);
    }

    #[tokio::test]
    async fn test_empty_cutoffs_skip_request() {
        // Port 9 is discard; no request should be attempted at all
        let client = ApiClient::new("http://127.0.0.1:9").unwrap();
        let stats = client.watcher_stats(&BTreeMap::new()).await.unwrap();
        assert!(stats.is_empty());
    }
}
