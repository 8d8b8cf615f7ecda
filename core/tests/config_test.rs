//! Environment-driven configuration and runtime startup.

use fusion_core::llm::LlmClientConfig;
use fusion_core::store::{StoreBackend, DATA_COLLECTION, TOOL_COLLECTION};
use fusion_core::{Fusion, FusionConfig, FusionError, QueryRequest, SolverConfig};
use serial_test::serial;
use tempfile::TempDir;

const LLM_VARS: [&str; 5] = [
    "LLM_BASE_URL",
    "LLM_MODEL",
    "LLM_API_KEY",
    "OPENAI_API_KEY",
    "LLM_TEMPERATURE",
];

fn clear_llm_env() {
    for var in LLM_VARS {
        std::env::remove_var(var);
    }
}

fn local_config(dir: &TempDir) -> FusionConfig {
    let mut config = FusionConfig::default();
    config.llm.base_url = "http://localhost:8000/v1".into();
    config.llm.api_key = None;
    config.store.backend = StoreBackend::Memory;
    config.store.sync_interval_secs = 0;
    config.tools.upload_dir = dir.path().join("uploads");
    config
}

#[test]
#[serial]
fn test_llm_config_defaults() {
    clear_llm_env();

    let config = LlmClientConfig::default();
    assert_eq!(config.base_url, "https://api.openai.com/v1");
    assert_eq!(config.model, "gpt-4");
    assert!(config.api_key.is_none());
}

#[test]
#[serial]
fn test_llm_config_reads_env_with_openai_key_fallback() {
    clear_llm_env();
    std::env::set_var("LLM_MODEL", "local-model");
    std::env::set_var("OPENAI_API_KEY", "sk-test");
    std::env::set_var("LLM_TEMPERATURE", "not a number");

    let config = LlmClientConfig::default();
    assert_eq!(config.model, "local-model");
    assert_eq!(config.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.temperature, 0.2);

    clear_llm_env();
}

#[test]
#[serial]
fn test_max_depth_comes_from_env() {
    std::env::set_var("MAX_RECURSION_DEPTH", "3");
    let config = SolverConfig::default();
    std::env::remove_var("MAX_RECURSION_DEPTH");

    assert_eq!(config.max_depth, 3);
    assert_eq!(SolverConfig::default().max_depth, 5);
}

#[test]
#[serial]
fn test_missing_api_key_for_remote_endpoint_is_fatal() {
    clear_llm_env();
    let mut config = FusionConfig::default();
    config.llm.base_url = "https://api.example.com/v1".into();

    let err = config.validate().unwrap_err();
    assert!(matches!(err, FusionError::Config(_)));
}

#[test]
fn test_zero_depth_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut config = local_config(&dir);
    config.solver.max_depth = 0;

    assert!(config.validate().is_err());
}

#[tokio::test]
#[serial]
async fn test_runtime_starts_with_local_endpoint_and_memory_store() {
    let dir = TempDir::new().unwrap();
    let mut fusion = Fusion::from_config(local_config(&dir)).await.unwrap();
    fusion.start().await.unwrap();

    let collections: Vec<_> = fusion
        .store
        .list_collections()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert!(collections.contains(&DATA_COLLECTION.to_string()));
    assert_eq!(fusion.store.count(TOOL_COLLECTION).await.unwrap(), 3);

    let response = fusion.solve(QueryRequest::new("")).await;
    assert!(response.error);

    fusion.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unusable_store_directory_fails_at_startup() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, "not a directory").unwrap();

    let mut config = local_config(&dir);
    config.store.backend = StoreBackend::RocksDb;
    config.store.path = blocker.join("db");

    let err = Fusion::from_config(config).await.err().unwrap();
    assert!(matches!(err, FusionError::StoreUnavailable(_)));
}
