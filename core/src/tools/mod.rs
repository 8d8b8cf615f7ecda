pub mod catalog;
pub mod error;
pub mod native;
pub mod registry;
pub mod traits;

// Re-export common types
pub use catalog::ToolCatalog;
pub use error::{ToolError, ToolResult};
pub use registry::{ToolOutcome, ToolRegistry};
pub use traits::{ParameterMap, ParameterSpec, ParameterType, Tool, ToolContext, ToolDescriptor};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::{env_parse, env_string};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Where uploaded files are staged
    pub upload_dir: PathBuf,
    pub call_timeout_ms: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            upload_dir: env_string("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./uploads")),
            call_timeout_ms: env_parse("TOOL_TIMEOUT_MS").unwrap_or(30_000),
        }
    }
}
