//! Google Custom Search JSON API provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{SearchHit, SearchProvider, WebSearchConfig, MAX_PROVIDER_RESULTS};
use crate::{FusionError, Result};

#[derive(Debug, Deserialize)]
struct CustomSearchResponse {
    #[serde(default)]
    items: Vec<CustomSearchItem>,
}

#[derive(Debug, Deserialize)]
struct CustomSearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

pub struct GoogleSearchProvider {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
    engine_id: Option<String>,
}

impl GoogleSearchProvider {
    pub fn new(config: &WebSearchConfig, http: Client) -> Self {
        Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            engine_id: config.engine_id.clone(),
        }
    }
}

#[async_trait]
impl SearchProvider for GoogleSearchProvider {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let (Some(key), Some(cx)) = (&self.api_key, &self.engine_id) else {
            return Err(FusionError::Search(
                "search credentials are not configured".into(),
            ));
        };
        let num = max_results.clamp(1, MAX_PROVIDER_RESULTS).to_string();
        debug!(target: "web_search", query = %query, num = %num, "Custom Search request");

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("key", key.as_str()),
                ("cx", cx.as_str()),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                warn!(target: "web_search", error = %e, "Custom Search request failed");
                FusionError::Search(format!("Search API request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(target: "web_search", status = %status, "Custom Search returned error");
            return Err(FusionError::Search(format!(
                "Search API returned status: {}",
                status
            )));
        }

        let parsed: CustomSearchResponse = response
            .json()
            .await
            .map_err(|e| FusionError::Search(format!("Failed to parse search response: {}", e)))?;

        Ok(parsed
            .items
            .into_iter()
            .filter(|item| !item.link.is_empty())
            .map(|item| SearchHit {
                title: item.title,
                url: item.link,
                snippet: item.snippet,
            })
            .collect())
    }
}
