//! LLM module: HTTP client, prompt adapter and the response contract
//!
//! This module provides:
//! - `CompletionModel`, the seam the solver, sandbox and UI selector call through
//! - `LlmClientConfig`, `LlmClient`, `LlmResponse` for talking to OpenAI-compatible backends
//! - `promptbundle_to_messages_and_text` adapter for turning `PromptBundle` into payloads
//! - `contract` with the closed decision schema replies are validated against

mod adapter;
mod client;
pub mod contract;

pub use adapter::promptbundle_to_messages_and_text;
pub use client::{LlmClient, LlmClientConfig, LlmResponse};
pub use contract::{parse_contract, parse_decision, ModelDecision, ToolCall};

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::context::{PromptBundle, PromptKind};
use crate::{prompts, FusionError, Result};

/// A stateless completion oracle
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, bundle: &PromptBundle) -> Result<String>;
}

/// One model call bounded by `timeout`
pub async fn complete_within(
    model: &dyn CompletionModel,
    bundle: &PromptBundle,
    timeout: Duration,
) -> Result<String> {
    match tokio::time::timeout(timeout, model.complete(bundle)).await {
        Ok(result) => result,
        Err(_) => Err(FusionError::Timeout(format!(
            "{:?} call exceeded {}ms",
            bundle.kind,
            timeout.as_millis()
        ))),
    }
}

/// Call the model and parse its reply as `T`.
///
/// A reply that breaks the contract gets exactly one clarifying re-prompt; a second
/// violation is returned as `MalformedModelOutput`.
pub async fn complete_with_repair<T: DeserializeOwned>(
    model: &dyn CompletionModel,
    bundle: &PromptBundle,
    timeout: Duration,
) -> Result<T> {
    let reply = complete_within(model, bundle, timeout).await?;
    let first_error = match parse_contract::<T>(&reply) {
        Ok(parsed) => return Ok(parsed),
        Err(e) => e,
    };
    warn!(target: "llm_client", kind = ?bundle.kind, error = %first_error, "Reply broke the response contract; re-prompting once");

    let repair = PromptBundle {
        kind: PromptKind::Repair,
        system: format!("{}\n\n{}", bundle.system, prompts::REPAIR),
        context_docs: bundle.context_docs.clone(),
        instructions: format!("{}\n\nPrevious reply:\n{}", bundle.instructions, reply),
    };
    let second = complete_within(model, &repair, timeout).await?;
    parse_contract::<T>(&second)
}
