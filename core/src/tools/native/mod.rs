pub mod filesystem;
pub mod upload;

pub use filesystem::ListUploadsTool;
pub use upload::{FileUploadTool, InformationUploadTool};

use std::path::Path;
use std::sync::Arc;

use super::ToolRegistry;

/// Register the built-in tools
pub async fn register_defaults(registry: &ToolRegistry, upload_dir: &Path) {
    registry
        .register(Arc::new(FileUploadTool::new(upload_dir.to_path_buf())))
        .await;
    registry
        .register(Arc::new(InformationUploadTool::new()))
        .await;
    registry
        .register(Arc::new(ListUploadsTool::new(upload_dir.to_path_buf())))
        .await;
}
