use crate::ingest::{ingest_file, stage_upload};
use crate::store::{Metadata, MetadataValue};
use crate::tools::traits::{ParameterMap, ParameterSpec, ParameterType, ToolContext};
use crate::tools::{Tool, ToolError, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::info;

// ─────────────────────────────────────────────────────────────────────────────
// file_upload
// ─────────────────────────────────────────────────────────────────────────────

pub struct FileUploadTool {
    upload_dir: PathBuf,
}

impl FileUploadTool {
    pub fn new(upload_dir: PathBuf) -> Self {
        Self { upload_dir }
    }

    /// Only attached files and files already in the upload directory may be uploaded
    async fn check_granted(&self, ctx: &ToolContext, path: &str) -> ToolResult<()> {
        if ctx.attachments.iter().any(|a| a == path) {
            return Ok(());
        }
        let inside_uploads = match (
            tokio::fs::canonicalize(path).await,
            tokio::fs::canonicalize(&self.upload_dir).await,
        ) {
            (Ok(file), Ok(root)) => file.starts_with(root),
            _ => false,
        };
        if inside_uploads {
            Ok(())
        } else {
            Err(ToolError::PermissionDenied(format!(
                "'{path}' is not an attached file"
            )))
        }
    }
}

#[async_trait]
impl Tool for FileUploadTool {
    fn name(&self) -> String {
        "file_upload".to_string()
    }

    fn description(&self) -> String {
        "Upload files to the system: copies them into the upload directory and indexes their text"
            .to_string()
    }

    fn parameters(&self) -> ParameterMap {
        let mut p = ParameterMap::new();
        p.insert(
            "file_paths".into(),
            ParameterSpec::optional(
                ParameterType::Array,
                "List of the file paths to upload (defaults to the attached files)",
            ),
        );
        p
    }

    async fn call(&self, ctx: &ToolContext, arguments: Value) -> ToolResult<Value> {
        let requested: Vec<String> = match arguments.get("file_paths") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| {
                    v.as_str().map(String::from).ok_or_else(|| {
                        ToolError::InvalidArguments("file_paths must contain strings".to_string())
                    })
                })
                .collect::<ToolResult<_>>()?,
            _ => Vec::new(),
        };
        let paths = if requested.is_empty() {
            ctx.attachments.clone()
        } else {
            for path in &requested {
                self.check_granted(ctx, path).await?;
            }
            requested
        };
        if paths.is_empty() {
            return Err(ToolError::InvalidArguments(
                "no file paths given and nothing attached".to_string(),
            ));
        }

        let mut stored = Vec::with_capacity(paths.len());
        for path in &paths {
            let staged = stage_upload(Path::new(path), &self.upload_dir)
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
            let doc = ingest_file(&staged)
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
            let id = ctx
                .store
                .insert(&ctx.collection, &doc.content, doc.metadata)
                .await?;

            info!(target: "tool_registry", file = %staged.display(), id = %id, "File uploaded");
            stored.push(staged.to_string_lossy().into_owned());
        }

        Ok(match stored.len() {
            1 => Value::String(stored.remove(0)),
            _ => json!(stored),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// information_upload
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InformationUploadTool;

impl InformationUploadTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for InformationUploadTool {
    fn name(&self) -> String {
        "information_upload".to_string()
    }

    fn description(&self) -> String {
        "Upload a piece of information to the system so later questions can use it".to_string()
    }

    fn parameters(&self) -> ParameterMap {
        let mut p = ParameterMap::new();
        p.insert(
            "information".into(),
            ParameterSpec::required(ParameterType::String, "The information to upload"),
        );
        p
    }

    async fn call(&self, ctx: &ToolContext, arguments: Value) -> ToolResult<Value> {
        let information = arguments["information"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'information' argument".to_string()))?;
        if information.trim().is_empty() {
            return Err(ToolError::InvalidArguments(
                "'information' must not be empty".to_string(),
            ));
        }

        let mut metadata = Metadata::new();
        metadata.insert("source".into(), "information_upload".into());
        metadata.insert("content_type".into(), MetadataValue::from("text"));
        let id = ctx
            .store
            .insert(&ctx.collection, information, metadata)
            .await?;

        Ok(json!({
            "stored": true,
            "id": id
        }))
    }
}
