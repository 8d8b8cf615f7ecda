//! Built-in tools, registry dispatch and the persisted tool catalog.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::memory_store;
use fusion_core::store::{DATA_COLLECTION, TOOL_COLLECTION};
use fusion_core::tools::native::{register_defaults, FileUploadTool, ListUploadsTool};
use fusion_core::tools::{
    ParameterMap, Tool, ToolCatalog, ToolContext, ToolError, ToolOutcome, ToolRegistry,
    ToolResult,
};
use fusion_core::VectorStore;
use serde_json::{json, Value};
use tempfile::TempDir;

fn context(store: &VectorStore, attachments: Vec<String>) -> ToolContext {
    ToolContext {
        store: store.clone(),
        collection: DATA_COLLECTION.to_string(),
        attachments,
    }
}

struct SlowTool;

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> String {
        "slow".to_string()
    }

    fn description(&self) -> String {
        "Never finishes in time".to_string()
    }

    fn parameters(&self) -> ParameterMap {
        ParameterMap::new()
    }

    async fn call(&self, _ctx: &ToolContext, _arguments: Value) -> ToolResult<Value> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(Value::Null)
    }
}

#[tokio::test]
async fn test_information_upload_stores_text() {
    let uploads = TempDir::new().unwrap();
    let store = memory_store();
    let registry = ToolRegistry::new();
    register_defaults(&registry, uploads.path()).await;

    let outcome = registry
        .invoke(
            "information_upload",
            json!({"information": "The office closes at 6pm"}),
            &context(&store, Vec::new()),
        )
        .await;

    let ToolOutcome::Succeeded(value) = outcome else {
        panic!("expected success, got {outcome:?}");
    };
    assert_eq!(value["stored"], true);
    let id = value["id"].as_str().unwrap();
    let record = store.get(DATA_COLLECTION, id).await.unwrap().unwrap();
    assert_eq!(record.content, "The office closes at 6pm");
    assert_eq!(record.metadata["source"].as_str(), Some("information_upload"));
}

#[tokio::test]
async fn test_file_upload_renames_on_collision_and_returns_all_paths() {
    let source = TempDir::new().unwrap();
    let uploads = TempDir::new().unwrap();
    let a = source.path().join("notes.txt");
    std::fs::write(&a, "first notes").unwrap();
    std::fs::write(uploads.path().join("notes.txt"), "already here").unwrap();

    let a = a.to_string_lossy().into_owned();
    let store = memory_store();
    let tool = FileUploadTool::new(uploads.path().to_path_buf());
    let value = tool
        .call(
            &context(&store, vec![a.clone()]),
            json!({"file_paths": [a, a]}),
        )
        .await
        .unwrap();

    let paths: Vec<String> = serde_json::from_value(value).unwrap();
    let dir = std::fs::canonicalize(uploads.path()).unwrap();
    assert_eq!(
        paths,
        vec![
            dir.join("notes_1.txt").to_string_lossy().into_owned(),
            dir.join("notes_2.txt").to_string_lossy().into_owned(),
        ]
    );
    assert_eq!(store.count(DATA_COLLECTION).await.unwrap(), 2);

    let hits = store.query(DATA_COLLECTION, "first notes", 1).await.unwrap();
    assert_eq!(hits[0].record.content, "first notes");
    let filename = hits[0].record.metadata["filename"].as_str().unwrap();
    assert!(filename.starts_with("notes_"));
}

#[tokio::test]
async fn test_file_upload_without_paths_or_attachments_is_invalid() {
    let uploads = TempDir::new().unwrap();
    let store = memory_store();
    let tool = FileUploadTool::new(uploads.path().to_path_buf());

    let err = tool
        .call(&context(&store, Vec::new()), json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::InvalidArguments(_)));
}

#[tokio::test]
async fn test_file_upload_rejects_paths_that_were_not_attached() {
    let source = TempDir::new().unwrap();
    let uploads = TempDir::new().unwrap();
    let attached = source.path().join("attached.txt");
    let private = source.path().join("private.txt");
    std::fs::write(&attached, "shared").unwrap();
    std::fs::write(&private, "do not index").unwrap();
    let attached = attached.to_string_lossy().into_owned();

    let store = memory_store();
    let registry = ToolRegistry::new();
    register_defaults(&registry, uploads.path()).await;
    let ctx = context(&store, vec![attached.clone()]);

    let outcome = registry
        .invoke(
            "file_upload",
            json!({"file_paths": [attached, private.to_string_lossy()]}),
            &ctx,
        )
        .await;
    let ToolOutcome::Failed(payload) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(payload["kind"], "permission_denied");

    let outcome = registry
        .invoke(
            "file_upload",
            json!({"file_paths": [private.to_string_lossy()]}),
            &context(&store, Vec::new()),
        )
        .await;
    assert!(matches!(outcome, ToolOutcome::Failed(_)));
    assert_eq!(store.count(DATA_COLLECTION).await.unwrap(), 0);
    assert_eq!(std::fs::read_dir(uploads.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_file_upload_accepts_files_already_in_upload_dir() {
    let uploads = TempDir::new().unwrap();
    let staged = uploads.path().join("report.txt");
    std::fs::write(&staged, "quarterly numbers").unwrap();

    let store = memory_store();
    let tool = FileUploadTool::new(uploads.path().to_path_buf());
    let value = tool
        .call(
            &context(&store, Vec::new()),
            json!({"file_paths": [staged.to_string_lossy()]}),
        )
        .await
        .unwrap();

    let dir = std::fs::canonicalize(uploads.path()).unwrap();
    assert_eq!(value, json!(dir.join("report.txt").to_string_lossy()));
    assert_eq!(store.count(DATA_COLLECTION).await.unwrap(), 1);
}

#[tokio::test]
async fn test_unknown_tool_yields_structured_failure() {
    let store = memory_store();
    let registry = ToolRegistry::new();

    let outcome = registry
        .invoke("teleport", json!({}), &context(&store, Vec::new()))
        .await;

    assert_eq!(
        outcome,
        ToolOutcome::Failed(json!({
            "error": true,
            "tool": "teleport",
            "kind": "unknown_tool",
            "message": "Unknown tool: teleport",
        }))
    );
}

#[tokio::test]
async fn test_slow_tool_times_out() {
    let store = memory_store();
    let registry = ToolRegistry::with_timeout(Duration::from_millis(50));
    registry.register(Arc::new(SlowTool)).await;

    let outcome = registry
        .invoke("slow", Value::Null, &context(&store, Vec::new()))
        .await;

    let ToolOutcome::Failed(payload) = outcome else {
        panic!("expected failure");
    };
    assert_eq!(payload["kind"], "timeout");
}

#[tokio::test]
async fn test_list_uploads_rejects_traversal_and_lists_sorted() {
    let uploads = TempDir::new().unwrap();
    std::fs::write(uploads.path().join("b.txt"), "bb").unwrap();
    std::fs::write(uploads.path().join("a.txt"), "a").unwrap();
    let store = memory_store();
    let tool = ListUploadsTool::new(uploads.path().to_path_buf());
    let ctx = context(&store, Vec::new());

    let listing = tool.call(&ctx, json!({})).await.unwrap();
    let names: Vec<_> = listing["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
    assert_eq!(listing["entries"][1]["size"], 2);

    let err = tool
        .call(&ctx, json!({"path": "../.."}))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::PermissionDenied(_)));
}

#[tokio::test]
async fn test_list_uploads_before_any_upload_is_empty() {
    let root = TempDir::new().unwrap();
    let store = memory_store();
    let tool = ListUploadsTool::new(root.path().join("never_created"));

    let listing = tool
        .call(&context(&store, Vec::new()), json!({}))
        .await
        .unwrap();
    assert_eq!(listing["entries"], json!([]));
}

#[tokio::test]
async fn test_catalog_sync_persists_each_tool_once() {
    let uploads = TempDir::new().unwrap();
    let store = memory_store();
    let registry = ToolRegistry::new();
    register_defaults(&registry, uploads.path()).await;
    let catalog = ToolCatalog::new(store.clone());

    assert_eq!(catalog.sync(&registry).await.unwrap(), 3);
    assert_eq!(catalog.sync(&registry).await.unwrap(), 0);
    assert_eq!(store.count(TOOL_COLLECTION).await.unwrap(), 3);

    let relevant = catalog
        .relevant("list the files previously uploaded", 1)
        .await
        .unwrap();
    assert_eq!(relevant.len(), 1);
    assert!(registry.contains(&relevant[0].name));
}
