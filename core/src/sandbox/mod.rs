//! Code synthesis sandbox.
//!
//! The model authors a routine in a closed JSON instruction set (see [`routine`]) and
//! the [`interpreter`] runs it with step, delegation, size and wall-clock limits.
//! Nothing the model writes is executed by the host.

pub mod interpreter;
pub mod routine;

pub use interpreter::{Interpreter, SandboxFault, OUTPUT_VAR};
pub use routine::{Routine, Step, SynthesisReply};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::env_parse;
use crate::context::{PromptBundle, PromptKind};
use crate::envelope::{QueryEnvelope, ResolutionResult};
use crate::llm::{complete_with_repair, CompletionModel};
use crate::{prompts, FusionError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub max_steps: usize,
    pub max_delegations: usize,
    /// Wall-clock budget of one routine, delegated sub-tasks included
    pub timeout_ms: u64,
    pub max_value_bytes: usize,
    pub max_file_bytes: usize,
    pub model_timeout_ms: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_steps: env_parse("SANDBOX_MAX_STEPS").unwrap_or(64),
            max_delegations: env_parse("SANDBOX_MAX_DELEGATIONS").unwrap_or(16),
            timeout_ms: env_parse("SANDBOX_TIMEOUT_MS").unwrap_or(300_000),
            max_value_bytes: 256 * 1024,
            max_file_bytes: 4 * 1024 * 1024,
            model_timeout_ms: env_parse("LLM_TIMEOUT_MS").unwrap_or(60_000),
        }
    }
}

/// Handle through which a routine hands sub-tasks back to the solver
#[async_trait]
pub trait Delegate: Send + Sync {
    async fn delegate(&self, envelope: QueryEnvelope) -> Result<ResolutionResult>;
}

/// A sub-task no declared tool covers
#[derive(Debug, Clone)]
pub struct SynthesisTask {
    pub envelope: QueryEnvelope,
    /// Retrieved records, web results and tool payloads gathered so far
    pub context: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisOutcome {
    /// The routine bound `output`
    Completed { result: Value, complete: bool },
    /// The routine faulted; `trace` is human readable
    Fault { trace: String },
    /// The model said it cannot write a routine
    Declined { reason: String },
}

pub struct CodeSynthesisSandbox {
    llm: Arc<dyn CompletionModel>,
    config: SandboxConfig,
}

impl CodeSynthesisSandbox {
    pub fn new(llm: Arc<dyn CompletionModel>, config: SandboxConfig) -> Self {
        Self { llm, config }
    }

    /// Obtain a routine for `task` and run it.
    ///
    /// Execution faults come back as [`SynthesisOutcome::Fault`]. Errors are reserved
    /// for model failures and for `DepthExceeded`, which always propagates.
    #[tracing::instrument(skip(self, task, delegate), fields(depth = task.envelope.depth))]
    pub async fn synthesize(
        &self,
        task: &SynthesisTask,
        delegate: &dyn Delegate,
    ) -> Result<SynthesisOutcome> {
        let bundle = PromptBundle::new(
            PromptKind::Synthesize,
            prompts::SYNTHESIS,
            format!(
                "Task: {}\nDepth: {}\nAttached files: {}",
                task.envelope.prompt,
                task.envelope.depth,
                serde_json::to_string(&task.envelope.file_paths)?
            ),
        )
        .with_context(task.context.clone());

        let reply: SynthesisReply = complete_with_repair(
            self.llm.as_ref(),
            &bundle,
            Duration::from_millis(self.config.model_timeout_ms),
        )
        .await?;

        let routine = match reply {
            SynthesisReply::Failed { reason } => {
                info!(target: "sandbox", reason = %reason, "Model declined to write a routine");
                return Ok(SynthesisOutcome::Declined { reason });
            }
            SynthesisReply::Routine(routine) => routine,
        };
        debug!(target: "sandbox", steps = routine.steps.len(), "Running routine");

        let mut interpreter = Interpreter::new(&self.config, task, delegate);
        let budget = Duration::from_millis(self.config.timeout_ms);
        let run = tokio::time::timeout(budget, interpreter.run(&routine)).await;
        let trace = interpreter.trace().join("\n");

        match run {
            Ok(Ok(output)) => Ok(completed_from_output(output)),
            Ok(Err(SandboxFault::DepthExceeded { depth, max })) => {
                warn!(target: "sandbox", depth, max, "Delegation exceeded the depth ceiling");
                Err(FusionError::DepthExceeded { depth, max })
            }
            Ok(Err(fault)) => {
                warn!(target: "sandbox", error = %fault, "Routine faulted");
                Ok(SynthesisOutcome::Fault { trace })
            }
            Err(_) => {
                let fault = SandboxFault::Timeout(self.config.timeout_ms);
                warn!(target: "sandbox", error = %fault, "Routine timed out");
                Ok(SynthesisOutcome::Fault {
                    trace: format!("{trace}\nfault: {fault}"),
                })
            }
        }
    }
}

fn completed_from_output(output: Value) -> SynthesisOutcome {
    let complete = output
        .get("complete")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let result = output.get("result").cloned().unwrap_or(Value::Null);
    SynthesisOutcome::Completed { result, complete }
}
