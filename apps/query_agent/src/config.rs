use std::fs;
use std::path::Path;

use fusion_core::llm::LlmClientConfig;
use fusion_core::sandbox::SandboxConfig;
use fusion_core::search::WebSearchConfig;
use fusion_core::store::{EmbeddingConfig, StoreConfig};
use fusion_core::tools::ToolsConfig;
use fusion_core::{FusionConfig, SolverConfig};

/// Configuration of the query agent: the runtime sections plus front-end settings
#[derive(Clone, Debug, Default)]
pub struct QueryAgentConfig {
    pub core: FusionConfig,
    /// Pretty-print responses on stdout
    pub pretty: bool,
}

impl QueryAgentConfig {
    /// Load configuration from a TOML file (path via QUERY_AGENT_CONFIG or ./query_agent.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path =
            std::env::var("QUERY_AGENT_CONFIG").unwrap_or_else(|_| "query_agent.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target: "query_agent", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match toml::from_str::<QueryAgentToml>(&s) {
                Ok(t) => t.overlay(default),
                Err(e) => {
                    tracing::warn!(target: "query_agent", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target: "query_agent", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }
}

// =========================
// TOML overlay definitions
// =========================

/// Each present section replaces the default one; fields missing inside a section
/// keep their env-driven defaults.
#[derive(Debug, Clone, Default, serde::Deserialize)]
struct QueryAgentToml {
    pub pretty: Option<bool>,
    pub llm: Option<LlmClientConfig>,
    pub embedding: Option<EmbeddingConfig>,
    pub store: Option<StoreConfig>,
    pub search: Option<WebSearchConfig>,
    pub tools: Option<ToolsConfig>,
    pub sandbox: Option<SandboxConfig>,
    pub solver: Option<SolverConfig>,
}

impl QueryAgentToml {
    fn overlay(self, mut base: QueryAgentConfig) -> QueryAgentConfig {
        if let Some(p) = self.pretty {
            base.pretty = p;
        }
        if let Some(l) = self.llm {
            base.core.llm = l;
        }
        if let Some(e) = self.embedding {
            base.core.embedding = e;
        }
        if let Some(s) = self.store {
            base.core.store = s;
        }
        if let Some(s) = self.search {
            base.core.search = s;
        }
        if let Some(t) = self.tools {
            base.core.tools = t;
        }
        if let Some(s) = self.sandbox {
            base.core.sandbox = s;
        }
        if let Some(s) = self.solver {
            base.core.solver = s;
        }
        base
    }
}
