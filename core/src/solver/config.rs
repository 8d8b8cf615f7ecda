use serde::{Deserialize, Serialize};

use crate::config::{env_bool, env_parse};
use crate::store::DATA_COLLECTION;

/// Query solver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Deepest envelope accepted; deeper ones fail with `DepthExceeded`
    pub max_depth: usize,
    /// Records retrieved per envelope
    pub top_k: usize,
    /// Web results requested on fallback
    pub web_results: usize,
    /// Tool descriptors offered to the model
    pub tool_k: usize,
    pub max_tool_dispatches: usize,
    pub llm_timeout_ms: u64,
    pub store_timeout_ms: u64,
    /// Persist top-level prompts into the data collection
    pub remember_prompts: bool,
    pub data_collection: String,
    pub ui_summary_chars: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_depth: env_parse("MAX_RECURSION_DEPTH").unwrap_or(5),
            top_k: 5,
            web_results: 5,
            tool_k: 8,
            max_tool_dispatches: 2,
            llm_timeout_ms: env_parse("LLM_TIMEOUT_MS").unwrap_or(60_000),
            store_timeout_ms: env_parse("STORE_TIMEOUT_MS").unwrap_or(10_000),
            remember_prompts: env_bool("REMEMBER_PROMPTS").unwrap_or(false),
            data_collection: DATA_COLLECTION.to_string(),
            ui_summary_chars: 500,
        }
    }
}
