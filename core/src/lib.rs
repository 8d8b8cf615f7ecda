// Fusion Core Library
// Retrieval-augmented query resolution runtime

pub mod config;
pub mod context;
pub mod envelope;
pub mod ingest;
pub mod llm;
pub mod prompts;
pub mod sandbox;
pub mod search;
pub mod solver;
pub mod store;
pub mod tools;
pub mod ui;

// Export core types
pub use config::FusionConfig;
pub use envelope::{Completion, QueryEnvelope, QueryRequest, QueryResponse, ResolutionResult};
pub use solver::{QuerySolver, SolverConfig};
pub use store::{CollectionHandle, VectorStore};
pub use tools::{ToolCatalog, ToolRegistry};
pub use ui::UiHint;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::llm::{CompletionModel, LlmClient};
use crate::search::WebSearchGateway;
use crate::store::{build_embedder, DATA_COLLECTION};

// Error types
#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Store write error: {0}")]
    StoreWriteError(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Malformed model output: {0}")]
    MalformedModelOutput(String),

    #[error("Recursion depth {depth} exceeds the configured maximum of {max}")]
    DepthExceeded { depth: usize, max: usize },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Ingest error: {0}")]
    Ingest(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, FusionError>;

/// Core runtime: owns the store, the tool registry and the solver built on top of them.
pub struct Fusion {
    pub solver: Arc<QuerySolver>,
    pub store: VectorStore,
    pub tool_registry: Arc<ToolRegistry>,
    catalog: ToolCatalog,
    sync_interval: Duration,
    sync_task: Option<JoinHandle<()>>,
}

impl Fusion {
    /// Build every component from an explicit configuration.
    ///
    /// Fatal configuration problems (missing credentials, unusable store directory)
    /// surface here, never per request.
    pub async fn from_config(config: FusionConfig) -> Result<Self> {
        config.validate()?;

        let embedder = build_embedder(&config.embedding)?;
        let store = VectorStore::open(&config.store, embedder)?;

        let llm: Arc<dyn CompletionModel> = Arc::new(LlmClient::new(config.llm.clone())?);
        let web = Arc::new(WebSearchGateway::from_config(config.search.clone())?);

        let tool_registry = Arc::new(ToolRegistry::with_timeout(Duration::from_millis(
            config.tools.call_timeout_ms,
        )));
        tools::native::register_defaults(&tool_registry, &config.tools.upload_dir).await;

        let solver = QuerySolver::new(llm, store.clone(), web, Arc::clone(&tool_registry))
            .with_config(config.solver.clone())
            .with_sandbox_config(config.sandbox.clone());

        Ok(Self {
            solver: Arc::new(solver),
            catalog: ToolCatalog::new(store.clone()),
            store,
            tool_registry,
            sync_interval: Duration::from_secs(config.store.sync_interval_secs),
            sync_task: None,
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        tracing::info!("Starting Fusion...");

        self.store.get_or_create_collection(DATA_COLLECTION).await?;
        let added = self.catalog.sync(&self.tool_registry).await?;
        tracing::info!(tools_persisted = added, "Tool catalog synchronised");

        if !self.sync_interval.is_zero() && self.sync_task.is_none() {
            self.sync_task = Some(self.store.spawn_sync(self.sync_interval));
        }

        tracing::info!("Fusion started successfully");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("Shutting down Fusion...");

        if let Some(task) = self.sync_task.take() {
            task.abort();
        }
        self.store.flush().await?;

        tracing::info!("Fusion shut down successfully");
        Ok(())
    }

    /// Answer a request; never fails, failures come back as an error-shaped response.
    pub async fn solve(&self, request: QueryRequest) -> QueryResponse {
        self.solver.solve(request).await
    }
}
