//! Query resolution core.
//!
//! A request moves through `RETRIEVE`, then `TOOL_DISPATCH`, `WEB_FALLBACK` and
//! `SYNTHESIZE` as needed, and ends in `DONE` or `UNRESOLVED`. Synthesized routines
//! may hand sub-tasks back to the solver one level deeper; the depth ceiling is
//! checked before any external call.

mod config;
mod state;

pub use config::SolverConfig;
pub use state::ResolutionState;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::context::{PromptBundle, PromptKind};
use crate::envelope::{QueryEnvelope, QueryRequest, QueryResponse, ResolutionResult};
use crate::llm::{complete_with_repair, CompletionModel, ModelDecision, ToolCall};
use crate::sandbox::{CodeSynthesisSandbox, Delegate, SandboxConfig, SynthesisOutcome, SynthesisTask};
use crate::search::{format_web_context, WebSearchGateway};
use crate::store::{Metadata, QueryHit, VectorStore};
use crate::tools::{ToolCatalog, ToolContext, ToolDescriptor, ToolOutcome, ToolRegistry};
use crate::ui::UiHintSelector;
use crate::{prompts, FusionError, Result};

/// Everything gathered while resolving one envelope
struct Working {
    envelope: QueryEnvelope,
    docs: Vec<String>,
    tools: Vec<ToolDescriptor>,
    web_done: bool,
    dispatches: usize,
}

pub struct QuerySolver {
    llm: Arc<dyn CompletionModel>,
    store: VectorStore,
    web: Arc<WebSearchGateway>,
    tools: Arc<ToolRegistry>,
    catalog: ToolCatalog,
    sandbox: CodeSynthesisSandbox,
    ui: UiHintSelector,
    config: SolverConfig,
}

impl QuerySolver {
    pub fn new(
        llm: Arc<dyn CompletionModel>,
        store: VectorStore,
        web: Arc<WebSearchGateway>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        let config = SolverConfig::default();
        Self {
            sandbox: CodeSynthesisSandbox::new(Arc::clone(&llm), SandboxConfig::default()),
            ui: Self::ui_selector(&llm, &config),
            catalog: ToolCatalog::new(store.clone()),
            llm,
            store,
            web,
            tools,
            config,
        }
    }

    pub fn with_config(mut self, config: SolverConfig) -> Self {
        self.ui = Self::ui_selector(&self.llm, &config);
        self.config = config;
        self
    }

    pub fn with_sandbox_config(mut self, config: SandboxConfig) -> Self {
        self.sandbox = CodeSynthesisSandbox::new(Arc::clone(&self.llm), config);
        self
    }

    fn ui_selector(llm: &Arc<dyn CompletionModel>, config: &SolverConfig) -> UiHintSelector {
        UiHintSelector::new(
            Arc::clone(llm),
            Duration::from_millis(config.llm_timeout_ms),
            config.ui_summary_chars,
        )
    }

    /// Caller-facing entry point. Never fails: errors become an error-shaped response.
    pub async fn solve(&self, request: QueryRequest) -> QueryResponse {
        if request.prompt.trim().is_empty() {
            return QueryResponse::failure("Prompt is required");
        }
        match self.solve_envelope(request.into()).await {
            Ok(result) => result.into_response(),
            Err(e) => {
                warn!(target: "query_solver", error = %e, "Resolution failed");
                QueryResponse::failure(e.to_string())
            }
        }
    }

    /// Typed, recursive entry point used by delegation
    pub fn solve_envelope(
        &self,
        envelope: QueryEnvelope,
    ) -> std::pin::Pin<Box<dyn Future<Output = Result<ResolutionResult>> + Send + '_>> {
        Box::pin(self.resolve(envelope))
    }

    #[tracing::instrument(skip(self, envelope), fields(depth = envelope.depth))]
    async fn resolve(&self, envelope: QueryEnvelope) -> Result<ResolutionResult> {
        if envelope.depth > self.config.max_depth {
            warn!(target: "query_solver", depth = envelope.depth, max = self.config.max_depth, "Depth ceiling reached");
            return Err(FusionError::DepthExceeded {
                depth: envelope.depth,
                max: self.config.max_depth,
            });
        }

        let mut work = Working {
            envelope,
            docs: Vec::new(),
            tools: Vec::new(),
            web_done: false,
            dispatches: 0,
        };
        let mut state = ResolutionState::Retrieve;

        while !state.is_terminal() {
            debug!(target: "query_solver", depth = work.envelope.depth, state = state.name(), "Entering state");
            state = match state {
                ResolutionState::Retrieve => self.retrieve(&mut work).await?,
                ResolutionState::ToolDispatch(call) => self.dispatch(&mut work, call).await,
                ResolutionState::WebFallback { prior } => self.web_fallback(&mut work, *prior).await?,
                ResolutionState::Synthesize => self.synthesize(&work).await?,
                terminal => terminal,
            };
        }
        debug!(target: "query_solver", depth = work.envelope.depth, state = state.name(), "Resolution finished");

        match state {
            ResolutionState::Done(result) => {
                let mut resolved = ResolutionResult::answered(result);
                if work.envelope.is_top_level() {
                    resolved.ui_hint = Some(self.ui.select(&resolved.result).await);
                }
                Ok(resolved)
            }
            ResolutionState::Unresolved(payload) => Ok(ResolutionResult::unresolved(payload)),
            other => Err(FusionError::Llm(format!(
                "resolution stopped in non-terminal state {}",
                other.name()
            ))),
        }
    }

    async fn retrieve(&self, work: &mut Working) -> Result<ResolutionState> {
        let hits = self.query_store(&work.envelope.prompt).await;
        if !hits.is_empty() {
            work.docs.push(format_retrieved(&hits));
        }
        if work.envelope.is_top_level() && self.config.remember_prompts {
            self.remember(&work.envelope.prompt).await;
        }
        work.tools = self.tool_descriptors(&work.envelope.prompt).await;

        match self.classify(PromptKind::Classify, prompts::CLASSIFY, work).await {
            Ok(decision) => {
                info!(target: "query_solver", depth = work.envelope.depth, decision = decision.label(), "Classified");
                Ok(ResolutionState::after_retrieval(decision))
            }
            Err(e @ FusionError::MalformedModelOutput(_)) => Err(e),
            Err(e) => {
                warn!(target: "query_solver", error = %e, "Classification call failed");
                Ok(ResolutionState::Unresolved(json!(format!(
                    "Unable to classify the request: {e}"
                ))))
            }
        }
    }

    async fn web_fallback(&self, work: &mut Working, prior: ModelDecision) -> Result<ResolutionState> {
        work.web_done = true;
        let prompt = work.envelope.prompt.clone();

        let documents = match self.web.try_search(&prompt, self.config.web_results).await {
            Ok(docs) => docs,
            Err(e) => {
                warn!(target: "query_solver", error = %e, "Web search failed; keeping the original classification");
                return Ok(ResolutionState::after_web(prior));
            }
        };
        if documents.is_empty() {
            debug!(target: "query_solver", "Web search returned nothing");
            return Ok(ResolutionState::after_web(prior));
        }
        work.docs.push(format_web_context(&documents));

        match self.classify(PromptKind::WebClassify, prompts::WEB_CLASSIFY, work).await {
            Ok(decision) => {
                info!(target: "query_solver", depth = work.envelope.depth, decision = decision.label(), "Re-classified with web results");
                Ok(ResolutionState::after_web(decision))
            }
            Err(e @ FusionError::MalformedModelOutput(_)) => Err(e),
            Err(e) => {
                warn!(target: "query_solver", error = %e, "Web-aware classification failed; keeping the original classification");
                Ok(ResolutionState::after_web(prior))
            }
        }
    }

    async fn dispatch(&self, work: &mut Working, call: ToolCall) -> ResolutionState {
        work.dispatches += 1;
        if work.dispatches > self.config.max_tool_dispatches {
            return ResolutionState::Unresolved(json!(format!(
                "Tool dispatch limit of {} reached",
                self.config.max_tool_dispatches
            )));
        }

        let ctx = ToolContext {
            store: self.store.clone(),
            collection: self.config.data_collection.clone(),
            attachments: work.envelope.file_paths.clone(),
        };
        match self.tools.invoke(&call.name, call.arguments, &ctx).await {
            ToolOutcome::Succeeded(value) => ResolutionState::Done(value),
            ToolOutcome::Failed(payload) => {
                work.docs
                    .push(format!("Tool call {} failed:\n{}", call.name, payload));
                if work.web_done {
                    ResolutionState::Unresolved(payload)
                } else {
                    ResolutionState::WebFallback {
                        prior: Box::new(ModelDecision::Insufficient { result: payload }),
                    }
                }
            }
        }
    }

    async fn synthesize(&self, work: &Working) -> Result<ResolutionState> {
        let task = SynthesisTask {
            envelope: work.envelope.clone(),
            context: work.docs.join("\n\n"),
        };

        match self.sandbox.synthesize(&task, self).await {
            Ok(SynthesisOutcome::Completed {
                result,
                complete: true,
            }) => Ok(ResolutionState::Done(result)),
            Ok(SynthesisOutcome::Completed {
                result,
                complete: false,
            }) => Ok(ResolutionState::Unresolved(result)),
            Ok(SynthesisOutcome::Fault { trace }) => Ok(ResolutionState::Unresolved(json!({
                "error": "synthesized routine failed",
                "trace": trace,
            }))),
            Ok(SynthesisOutcome::Declined { reason }) => Ok(ResolutionState::Unresolved(json!(
                format!("Unable to resolve the task: {reason}")
            ))),
            Err(e @ (FusionError::DepthExceeded { .. } | FusionError::MalformedModelOutput(_))) => {
                Err(e)
            }
            Err(e) => {
                warn!(target: "query_solver", error = %e, "Synthesis failed");
                Ok(ResolutionState::Unresolved(json!(format!(
                    "Synthesis failed: {e}"
                ))))
            }
        }
    }

    async fn classify(
        &self,
        kind: PromptKind,
        system: &str,
        work: &Working,
    ) -> Result<ModelDecision> {
        let tools = serde_json::to_string_pretty(&work.tools)?;
        let files = serde_json::to_string(&work.envelope.file_paths)?;
        let mut bundle = PromptBundle::new(
            kind,
            system,
            format!(
                "Available tools:\n{tools}\n\nAttached files: {files}\n\nTask: {}",
                work.envelope.prompt
            ),
        );
        for doc in &work.docs {
            bundle = bundle.with_context(doc.clone());
        }

        complete_with_repair(
            self.llm.as_ref(),
            &bundle,
            Duration::from_millis(self.config.llm_timeout_ms),
        )
        .await
    }

    /// Retrieval failures and timeouts degrade to no context
    async fn query_store(&self, prompt: &str) -> Vec<QueryHit> {
        let timeout = Duration::from_millis(self.config.store_timeout_ms);
        let query = self
            .store
            .query(&self.config.data_collection, prompt, self.config.top_k);
        match tokio::time::timeout(timeout, query).await {
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) => {
                warn!(target: "query_solver", error = %e, "Retrieval failed; continuing without context");
                Vec::new()
            }
            Err(_) => {
                warn!(target: "query_solver", "Retrieval timed out; continuing without context");
                Vec::new()
            }
        }
    }

    async fn remember(&self, prompt: &str) {
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), "chat".into());
        let timeout = Duration::from_millis(self.config.store_timeout_ms);
        let insert = self
            .store
            .insert(&self.config.data_collection, prompt, metadata);
        match tokio::time::timeout(timeout, insert).await {
            Ok(Ok(id)) => debug!(target: "query_solver", id = %id, "Prompt remembered"),
            Ok(Err(e)) => warn!(target: "query_solver", error = %e, "Could not remember prompt"),
            Err(_) => warn!(target: "query_solver", "Remembering prompt timed out"),
        }
    }

    /// Catalog matches that are still registered, or every registered tool
    async fn tool_descriptors(&self, prompt: &str) -> Vec<ToolDescriptor> {
        let timeout = Duration::from_millis(self.config.store_timeout_ms);
        let relevant = tokio::time::timeout(timeout, self.catalog.relevant(prompt, self.config.tool_k)).await;
        let matched: Vec<ToolDescriptor> = match relevant {
            Ok(Ok(found)) => found
                .into_iter()
                .filter(|d| self.tools.contains(&d.name))
                .collect(),
            Ok(Err(e)) => {
                warn!(target: "query_solver", error = %e, "Tool catalog query failed; offering all tools");
                Vec::new()
            }
            Err(_) => {
                warn!(target: "query_solver", "Tool catalog query timed out; offering all tools");
                Vec::new()
            }
        };
        if matched.is_empty() {
            self.tools.descriptors()
        } else {
            matched
        }
    }
}

#[async_trait]
impl Delegate for QuerySolver {
    async fn delegate(&self, envelope: QueryEnvelope) -> Result<ResolutionResult> {
        self.solve_envelope(envelope).await
    }
}

/// `From <id>: <content>` blocks separated by blank lines
fn format_retrieved(hits: &[QueryHit]) -> String {
    hits.iter()
        .map(|h| format!("From {}: {}", h.record.id, h.record.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}
