use thiserror::Error;

use crate::FusionError;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Timed out after {0}ms")]
    Timeout(u64),

    #[error("Store error: {0}")]
    Store(#[from] FusionError),
}

impl ToolError {
    /// Stable snake_case tag used in failure payloads
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::UnknownTool(_) => "unknown_tool",
            ToolError::InvalidArguments(_) => "invalid_arguments",
            ToolError::ExecutionFailed(_) => "execution_failed",
            ToolError::PermissionDenied(_) => "permission_denied",
            ToolError::Timeout(_) => "timeout",
            ToolError::Store(_) => "store",
        }
    }
}

pub type ToolResult<T> = Result<T, ToolError>;
