//! Shared test doubles for the integration tests.
//!
//! - `ScriptedModel`: completion model replying from per-kind queues
//! - `StaticSearch`: search provider returning fixed hits (or failing)
//! - builders for an in-memory store and a fully wired solver

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fusion_core::context::{PromptBundle, PromptKind};
use fusion_core::llm::CompletionModel;
use fusion_core::sandbox::SandboxConfig;
use fusion_core::search::{SearchHit, SearchProvider, WebSearchConfig, WebSearchGateway};
use fusion_core::store::HashingEmbedder;
use fusion_core::tools::native::register_defaults;
use fusion_core::{FusionError, QuerySolver, Result, SolverConfig, ToolRegistry, VectorStore};

// =============================================================================
// Completion model
// =============================================================================

/// Replies are popped from the queue of the bundle's kind; when the queue is empty the
/// kind's standing reply is used, and with neither the call fails.
#[derive(Default)]
pub struct ScriptedModel {
    queued: Mutex<HashMap<PromptKind, VecDeque<String>>>,
    standing: Mutex<HashMap<PromptKind, String>>,
    calls: Mutex<Vec<PromptBundle>>,
}

impl ScriptedModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, kind: PromptKind, reply: impl Into<String>) -> &Self {
        self.queued
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push_back(reply.into());
        self
    }

    pub fn always(&self, kind: PromptKind, reply: impl Into<String>) -> &Self {
        self.standing.lock().unwrap().insert(kind, reply.into());
        self
    }

    pub fn calls(&self) -> Vec<PromptBundle> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, kind: PromptKind) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.kind == kind)
            .count()
    }
}

#[async_trait]
impl CompletionModel for ScriptedModel {
    async fn complete(&self, bundle: &PromptBundle) -> Result<String> {
        self.calls.lock().unwrap().push(bundle.clone());
        if let Some(reply) = self
            .queued
            .lock()
            .unwrap()
            .get_mut(&bundle.kind)
            .and_then(|q| q.pop_front())
        {
            return Ok(reply);
        }
        self.standing
            .lock()
            .unwrap()
            .get(&bundle.kind)
            .cloned()
            .ok_or_else(|| FusionError::Llm(format!("no scripted reply for {:?}", bundle.kind)))
    }
}

// =============================================================================
// Search provider
// =============================================================================

pub struct StaticSearch {
    hits: Vec<SearchHit>,
    fail: bool,
    calls: AtomicUsize,
}

impl StaticSearch {
    pub fn with_hits(hits: Vec<SearchHit>) -> Arc<Self> {
        Arc::new(Self {
            hits,
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn empty() -> Arc<Self> {
        Self::with_hits(Vec::new())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            hits: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(FusionError::Search("provider unavailable".into()));
        }
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }
}

pub fn hit(title: &str, url: &str, snippet: &str) -> SearchHit {
    SearchHit {
        title: title.to_string(),
        url: url.to_string(),
        snippet: snippet.to_string(),
    }
}

// =============================================================================
// Builders
// =============================================================================

pub fn memory_store() -> VectorStore {
    VectorStore::in_memory(Arc::new(HashingEmbedder::new(128)))
}

/// Web config that never touches the network: snippets stand in for pages
pub fn offline_web_config() -> WebSearchConfig {
    WebSearchConfig {
        fetch_pages: false,
        timeout_ms: 2_000,
        ..WebSearchConfig::default()
    }
}

pub fn solver_config() -> SolverConfig {
    SolverConfig {
        max_depth: 5,
        llm_timeout_ms: 2_000,
        store_timeout_ms: 2_000,
        remember_prompts: false,
        ..SolverConfig::default()
    }
}

pub fn sandbox_config() -> SandboxConfig {
    SandboxConfig {
        max_steps: 32,
        max_delegations: 8,
        timeout_ms: 10_000,
        model_timeout_ms: 2_000,
        ..SandboxConfig::default()
    }
}

pub async fn build_solver(
    model: Arc<ScriptedModel>,
    store: VectorStore,
    search: Arc<dyn SearchProvider>,
    upload_dir: &Path,
) -> QuerySolver {
    let registry = Arc::new(ToolRegistry::new());
    register_defaults(&registry, upload_dir).await;
    let web = Arc::new(WebSearchGateway::new(search, offline_web_config()).unwrap());

    QuerySolver::new(model, store, web, registry)
        .with_config(solver_config())
        .with_sandbox_config(sandbox_config())
}
