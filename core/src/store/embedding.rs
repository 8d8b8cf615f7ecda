//! Text embedders used by the vector store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::{env_parse, env_string};
use crate::{FusionError, Result};

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    Hashing,
    OpenAi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    /// Vector width of the hashing embedder
    pub dimensions: usize,
    pub request_timeout_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let provider = match env_string("EMBEDDING_PROVIDER")
            .map(|p| p.to_ascii_lowercase())
            .as_deref()
        {
            Some("openai") => EmbeddingProvider::OpenAi,
            _ => EmbeddingProvider::Hashing,
        };
        Self {
            provider,
            model: env_string("EMBEDDING_MODEL")
                .unwrap_or_else(|| "text-embedding-ada-002".to_string()),
            base_url: env_string("LLM_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key: env_string("LLM_API_KEY").or_else(|| env_string("OPENAI_API_KEY")),
            dimensions: env_parse("EMBEDDING_DIMENSIONS").unwrap_or(384),
            request_timeout_ms: env_parse("EMBEDDING_TIMEOUT_MS").unwrap_or(30_000),
        }
    }
}

pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider {
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbedder::new(config.dimensions))),
        EmbeddingProvider::OpenAi => Ok(Arc::new(OpenAiEmbedder::new(config)?)),
    }
}

/// Deterministic term-frequency vectors hashed into fixed buckets.
///
/// Not semantically rich, but needs no network and gives stable rankings for
/// lexically similar text.
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// FNV-1a
    fn bucket(term: &str, dims: usize) -> usize {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in term.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        (h % dims as u64) as usize
    }

    fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|s| s.chars().count() >= 2)
            .map(|s| s.to_lowercase())
    }

    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut tf: HashMap<String, f32> = HashMap::new();
        let mut total = 0.0f32;
        for tok in Self::tokenize(text) {
            *tf.entry(tok).or_default() += 1.0;
            total += 1.0;
        }

        let mut vec = vec![0.0f32; self.dimensions];
        if total == 0.0 {
            return vec;
        }
        for (term, count) in &tf {
            // Longer terms carry more signal than short function words
            let weight = 1.0 + (term.len() as f32).ln();
            vec[Self::bucket(term, self.dimensions)] += (count / total) * weight;
        }

        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vec {
                *v /= norm;
            }
        }
        vec
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

/// OpenAI-compatible `/embeddings` endpoint
pub struct OpenAiEmbedder {
    http: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| FusionError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut req = self
            .http
            .post(format!("{}/embeddings", self.base_url))
            .json(&json!({"model": self.model, "input": text}));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| FusionError::StoreUnavailable(format!("embedding request failed: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(FusionError::StoreUnavailable(format!(
                "embedding endpoint returned {status}: {body}"
            )));
        }

        let val: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| FusionError::StoreUnavailable(format!("invalid embedding JSON: {e}")))?;
        let vector = val
            .pointer("/data/0/embedding")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                FusionError::StoreUnavailable("missing data[0].embedding in response".into())
            })?;
        Ok(vector
            .iter()
            .filter_map(|x| x.as_f64())
            .map(|x| x as f32)
            .collect())
    }

    fn name(&self) -> &str {
        &self.model
    }
}
