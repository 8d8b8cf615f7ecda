//! Runtime configuration.
//!
//! Every section reads its defaults from the process environment once, when the
//! `Default` impl runs. Components receive their section explicitly at construction
//! and never consult the environment afterwards, so tests can build them from plain
//! structs.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::llm::LlmClientConfig;
use crate::sandbox::SandboxConfig;
use crate::search::WebSearchConfig;
use crate::solver::SolverConfig;
use crate::store::{EmbeddingConfig, EmbeddingProvider, StoreConfig};
use crate::tools::ToolsConfig;
use crate::{FusionError, Result};

/// Full configuration of a Fusion runtime
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FusionConfig {
    pub llm: LlmClientConfig,
    pub embedding: EmbeddingConfig,
    pub store: StoreConfig,
    pub search: WebSearchConfig,
    pub tools: ToolsConfig,
    pub sandbox: SandboxConfig,
    pub solver: SolverConfig,
}

impl FusionConfig {
    /// Startup checks. Anything reported here is fatal and must stop the process.
    pub fn validate(&self) -> Result<()> {
        if self.llm.api_key.is_none() && !is_local_endpoint(&self.llm.base_url) {
            return Err(FusionError::Config(format!(
                "missing LLM API key for non-local endpoint {} (set LLM_API_KEY or OPENAI_API_KEY)",
                self.llm.base_url
            )));
        }
        if self.embedding.provider == EmbeddingProvider::OpenAi
            && self.embedding.api_key.is_none()
            && !is_local_endpoint(&self.embedding.base_url)
        {
            return Err(FusionError::Config(
                "openai embedding provider selected without an API key".into(),
            ));
        }
        if self.embedding.dimensions == 0 {
            return Err(FusionError::Config(
                "embedding dimensions must be positive".into(),
            ));
        }
        if self.solver.max_depth == 0 {
            return Err(FusionError::Config(
                "max recursion depth must be at least 1".into(),
            ));
        }
        if self.solver.top_k == 0 {
            return Err(FusionError::Config("retrieval top_k must be positive".into()));
        }
        if self.sandbox.max_steps == 0 {
            return Err(FusionError::Config("sandbox max_steps must be positive".into()));
        }
        if self.search.api_key.is_none() || self.search.engine_id.is_none() {
            tracing::warn!(
                target: "config",
                "SEARCH_API_KEY / SEARCH_ENGINE_ID not set; web fallback will always degrade"
            );
        }
        Ok(())
    }
}

/// True for endpoints that do not need credentials (local inference servers)
pub fn is_local_endpoint(url: &str) -> bool {
    let rest = url
        .trim_start_matches("http://")
        .trim_start_matches("https://");
    rest.starts_with("localhost") || rest.starts_with("127.0.0.1") || rest.starts_with("[::1]")
}

/// Non-empty environment variable
pub(crate) fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

/// Environment variable parsed into `T`; unparsable values are ignored
pub(crate) fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|v| v.trim().parse::<T>().ok())
}

pub(crate) fn env_bool(name: &str) -> Option<bool> {
    env_string(name).map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}
