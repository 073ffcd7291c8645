//! wallhaven.cc v1 search API client.

use super::{ImageSource, RemoteImage};
use crate::error::SourceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Remote source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// API base, e.g. `https://wallhaven.cc/api/v1`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Optional wallhaven API key.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Purity mask, SFW-only by default.
    #[serde(default = "default_purity")]
    pub purity: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://wallhaven.cc/api/v1".to_string()
}
fn default_purity() -> String {
    "100".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            purity: default_purity(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: String,
    path: String,
}

/// Client for the wallhaven.cc v1 search API.
pub struct WallhavenSource {
    config: SourceConfig,
    client: reqwest::Client,
}

impl WallhavenSource {
    pub fn new(config: SourceConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("wallflow/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { config, client })
    }

    fn search_url(&self, query: &str, page: u32) -> String {
        format!(
            "{}/search?q={}&sorting=random&purity={}&page={}",
            self.config.base_url, query, self.config.purity, page
        )
    }

    async fn fetch_page(&self, query: &str, page: u32) -> Result<Vec<RemoteImage>, SourceError> {
        let url = self.search_url(query, page);
        debug!("searching {}", url);

        let mut req = self.client.get(&url);
        if let Some(ref key) = self.config.api_key {
            req = req.header("X-API-Key", key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("search returned {}: {}", status, body);
            return Err(SourceError::Status { status, body });
        }

        let parsed: SearchResponse = response.json().await?;
        Ok(parsed
            .data
            .into_iter()
            .map(|hit| RemoteImage {
                id: hit.id,
                url: hit.path,
            })
            .collect())
    }
}

#[async_trait]
impl ImageSource for WallhavenSource {
    async fn search(&self, query: &str, page_hint: u32) -> Result<Vec<RemoteImage>, SourceError> {
        let hits = self.fetch_page(query, page_hint).await?;
        if hits.is_empty() && page_hint > 1 {
            // a random page can overshoot the result count
            debug!("page {} empty for '{}', retrying page 1", page_hint, query);
            return self.fetch_page(query, 1).await;
        }
        Ok(hits)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        debug!("downloading {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status { status, body });
        }
        Ok(response.bytes().await?.to_vec())
    }
}
