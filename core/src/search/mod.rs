//! Web search gateway.
//!
//! Composes a [`SearchProvider`] with a page fetcher. Individual page failures leave
//! that hit's content empty; a failed search call is visible through
//! [`WebSearchGateway::try_search`] and becomes an empty list through
//! [`WebSearchGateway::search`].

mod google;
mod page;

pub use google::GoogleSearchProvider;
pub use page::{clean_html, MAX_PAGE_CHARS};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{env_bool, env_parse, env_string};
use crate::{FusionError, Result};

/// Upper bound on results per query accepted by the provider
pub const MAX_PROVIDER_RESULTS: usize = 10;

/// Bytes of a page body read before the rest is dropped
pub const DEFAULT_MAX_PAGE_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSearchConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub engine_id: Option<String>,
    /// Timeout of the search call itself
    pub timeout_ms: u64,
    /// Timeout of each page fetch
    pub page_timeout_ms: u64,
    pub user_agent: String,
    pub max_content_chars: usize,
    /// Page bodies are cut at this many bytes before parsing
    pub max_page_bytes: usize,
    /// When false, the snippet stands in for page content and no page is fetched
    pub fetch_pages: bool,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            endpoint: env_string("SEARCH_ENDPOINT")
                .unwrap_or_else(|| "https://www.googleapis.com/customsearch/v1".to_string()),
            api_key: env_string("SEARCH_API_KEY"),
            engine_id: env_string("SEARCH_ENGINE_ID"),
            timeout_ms: env_parse("SEARCH_TIMEOUT_MS").unwrap_or(10_000),
            page_timeout_ms: env_parse("SEARCH_PAGE_TIMEOUT_MS").unwrap_or(10_000),
            user_agent: "fusion-agent/0.1".to_string(),
            max_content_chars: MAX_PAGE_CHARS,
            max_page_bytes: env_parse("SEARCH_MAX_PAGE_BYTES").unwrap_or(DEFAULT_MAX_PAGE_BYTES),
            fetch_pages: env_bool("SEARCH_FETCH_PAGES").unwrap_or(true),
        }
    }
}

/// Raw provider hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Hit plus cleaned page text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebDocument {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Empty when the page could not be fetched or parsed
    pub content: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;
}

pub struct WebSearchGateway {
    provider: Arc<dyn SearchProvider>,
    http: Client,
    config: WebSearchConfig,
}

impl WebSearchGateway {
    /// Gateway over the Custom Search provider
    pub fn from_config(config: WebSearchConfig) -> Result<Self> {
        let http = Self::http_client(&config)?;
        let provider = Arc::new(GoogleSearchProvider::new(&config, http.clone()));
        Ok(Self {
            provider,
            http,
            config,
        })
    }

    pub fn new(provider: Arc<dyn SearchProvider>, config: WebSearchConfig) -> Result<Self> {
        let http = Self::http_client(&config)?;
        Ok(Self {
            provider,
            http,
            config,
        })
    }

    fn http_client(config: &WebSearchConfig) -> Result<Client> {
        Client::builder()
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| FusionError::Config(format!("Failed to build HTTP client: {e}")))
    }

    /// Search and fetch. Fails only when the search call itself fails.
    pub async fn try_search(&self, query: &str, max_results: usize) -> Result<Vec<WebDocument>> {
        let max_results = max_results.clamp(1, MAX_PROVIDER_RESULTS);
        let timeout = Duration::from_millis(self.config.timeout_ms);

        let mut hits = match tokio::time::timeout(timeout, self.provider.search(query, max_results)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(FusionError::Timeout(format!(
                    "web search exceeded {}ms",
                    self.config.timeout_ms
                )))
            }
        };
        hits.truncate(max_results);
        debug!(target: "web_search", query = %query, hits = hits.len(), "Search returned");

        let mut documents = Vec::with_capacity(hits.len());
        for hit in hits {
            let content = if self.config.fetch_pages {
                self.fetch_page(&hit.url).await
            } else {
                hit.snippet.chars().take(self.config.max_content_chars).collect()
            };
            documents.push(WebDocument {
                title: hit.title,
                url: hit.url,
                snippet: hit.snippet,
                content,
            });
        }
        Ok(documents)
    }

    /// Never fails: a failed search yields no documents
    pub async fn search(&self, query: &str, max_results: usize) -> Vec<WebDocument> {
        match self.try_search(query, max_results).await {
            Ok(docs) => docs,
            Err(e) => {
                warn!(target: "web_search", query = %query, error = %e, "Web search failed; returning no results");
                Vec::new()
            }
        }
    }

    async fn fetch_page(&self, url: &str) -> String {
        let timeout = Duration::from_millis(self.config.page_timeout_ms);
        let fetched = async {
            let resp = self.http.get(url).timeout(timeout).send().await?;
            read_capped(resp.error_for_status()?, self.config.max_page_bytes).await
        };

        match fetched.await {
            Ok(html) => clean_html(&html, self.config.max_content_chars),
            Err(e) => {
                warn!(target: "web_search", url = %url, error = %e, "Page fetch failed; leaving content empty");
                String::new()
            }
        }
    }
}

/// Read at most `max_bytes` of the body; anything past the cap is never buffered
async fn read_capped(mut resp: reqwest::Response, max_bytes: usize) -> reqwest::Result<String> {
    let hint = resp.content_length().unwrap_or(0).min(max_bytes as u64) as usize;
    let mut body = Vec::with_capacity(hint);
    while let Some(chunk) = resp.chunk().await? {
        let room = max_bytes - body.len();
        if chunk.len() > room {
            body.extend_from_slice(&chunk[..room]);
            debug!(target: "web_search", url = %resp.url(), max_bytes, "Page body truncated");
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}

/// Render documents as a context block for the model
pub fn format_web_context(documents: &[WebDocument]) -> String {
    let mut out = String::from("Web Search Results:\n");
    for doc in documents {
        out.push_str(&format!("\nFrom {} ({}):\n{}\n", doc.title, doc.url, doc.content));
    }
    out
}
