use crate::tools::traits::{ParameterMap, ParameterSpec, ParameterType, ToolContext};
use crate::tools::{Tool, ToolError, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};
use tokio::fs;

// ─────────────────────────────────────────────────────────────────────────────
// list_uploads
// ─────────────────────────────────────────────────────────────────────────────

pub struct ListUploadsTool {
    upload_dir: PathBuf,
}

impl ListUploadsTool {
    pub fn new(upload_dir: PathBuf) -> Self {
        Self { upload_dir }
    }
}

/// Only plain relative paths below the upload directory are allowed
fn is_contained(relative: &Path) -> bool {
    relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[async_trait]
impl Tool for ListUploadsTool {
    fn name(&self) -> String {
        "list_uploads".to_string()
    }

    fn description(&self) -> String {
        "List files previously uploaded to the system".to_string()
    }

    fn parameters(&self) -> ParameterMap {
        let mut p = ParameterMap::new();
        p.insert(
            "path".into(),
            ParameterSpec::optional(
                ParameterType::String,
                "Relative path inside the upload directory (default: its root)",
            ),
        );
        p
    }

    async fn call(&self, _ctx: &ToolContext, arguments: Value) -> ToolResult<Value> {
        let path_str = arguments["path"].as_str().unwrap_or(".");

        // Security check
        if !is_contained(Path::new(path_str)) {
            return Err(ToolError::PermissionDenied(
                "Path traversal detected".to_string(),
            ));
        }
        let path = self.upload_dir.join(path_str);

        if !path.exists() {
            if path_str == "." {
                // Nothing uploaded yet
                return Ok(json!({ "path": path_str, "entries": [] }));
            }
            return Err(ToolError::ExecutionFailed(format!(
                "Directory not found: {}",
                path_str
            )));
        }

        let mut entries = fs::read_dir(&path)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to read directory: {}", e)))?;

        let mut items = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to read entry: {}", e)))?
        {
            let metadata = entry.metadata().await.ok();
            let name = entry.file_name().to_string_lossy().to_string();
            let is_dir = metadata.as_ref().map(|m| m.is_dir()).unwrap_or(false);
            let size = metadata.as_ref().map(|m| m.len()).unwrap_or(0);
            items.push((name, is_dir, size));
        }
        items.sort_by(|a, b| a.0.cmp(&b.0));

        let entries: Vec<Value> = items
            .into_iter()
            .map(|(name, is_dir, size)| json!({ "name": name, "is_dir": is_dir, "size": size }))
            .collect();

        Ok(json!({
            "path": path_str,
            "entries": entries
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containment() {
        assert!(is_contained(Path::new(".")));
        assert!(is_contained(Path::new("reports/2024")));
        assert!(!is_contained(Path::new("../etc")));
        assert!(!is_contained(Path::new("a/../../b")));
        assert!(!is_contained(Path::new("/etc/passwd")));
    }
}
