//! Capability-limited interpreter for routines.
//!
//! A run starts from a fresh namespace holding only `task`, `depth` and `file_paths`.
//! The only ways out of the namespace are reading granted attachments and delegating
//! sub-tasks through the [`Delegate`] handle.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use super::routine::{Routine, Step};
use super::{Delegate, SandboxConfig, SynthesisTask};
use crate::ingest::ingest_file;
use crate::FusionError;

/// Name the result of `finish` is bound to
pub const OUTPUT_VAR: &str = "output";

#[derive(Error, Debug)]
pub enum SandboxFault {
    #[error("step limit of {0} exceeded")]
    StepLimit(usize),

    #[error("delegation limit of {0} exceeded")]
    DelegationLimit(usize),

    #[error("routine exceeded its {0}ms wall-clock budget")]
    Timeout(u64),

    #[error("unbound variable '{0}'")]
    UnboundVariable(String),

    #[error("'{0}' is a reserved name")]
    ReservedName(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("file '{0}' was not granted to this routine")]
    FileNotGranted(String),

    #[error("file '{path}' is {bytes} bytes, limit is {max}")]
    FileTooLarge { path: String, bytes: u64, max: usize },

    #[error("value bound to '{name}' is {bytes} bytes, limit is {max}")]
    ValueTooLarge {
        name: String,
        bytes: usize,
        max: usize,
    },

    #[error("could not read '{path}': {message}")]
    Io { path: String, message: String },

    #[error("routine failed: {0}")]
    Explicit(String),

    #[error("delegated sub-task failed: {0}")]
    DelegationFailed(String),

    #[error("delegation depth {depth} exceeds maximum {max}")]
    DepthExceeded { depth: usize, max: usize },

    #[error("routine did not bind output")]
    MissingOutput,
}

pub struct Interpreter<'a> {
    config: &'a SandboxConfig,
    task: &'a SynthesisTask,
    delegate: &'a dyn Delegate,
    namespace: BTreeMap<String, Value>,
    trace: Vec<String>,
    steps: usize,
    delegations: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(config: &'a SandboxConfig, task: &'a SynthesisTask, delegate: &'a dyn Delegate) -> Self {
        let mut namespace = BTreeMap::new();
        namespace.insert("task".to_string(), json!(task.envelope.prompt));
        namespace.insert("depth".to_string(), json!(task.envelope.depth));
        namespace.insert("file_paths".to_string(), json!(task.envelope.file_paths));
        Self {
            config,
            task,
            delegate,
            namespace,
            trace: Vec::new(),
            steps: 0,
            delegations: 0,
        }
    }

    pub fn trace(&self) -> &[String] {
        &self.trace
    }

    /// Execute `routine` and return the value bound to `output`
    pub async fn run(&mut self, routine: &Routine) -> Result<Value, SandboxFault> {
        for (i, item) in routine.plan.iter().enumerate() {
            self.trace.push(format!("plan {}: {}", i + 1, item));
        }

        match self.run_steps(routine).await {
            Ok(output) => Ok(output),
            Err(fault) => {
                self.trace.push(format!("fault: {fault}"));
                Err(fault)
            }
        }
    }

    async fn run_steps(&mut self, routine: &Routine) -> Result<Value, SandboxFault> {
        for step in &routine.steps {
            self.tick()?;
            self.trace.push(format!("step {}: {}", self.steps, step.op()));
            self.exec(step).await?;
            if self.namespace.contains_key(OUTPUT_VAR) {
                break;
            }
        }

        self.namespace
            .remove(OUTPUT_VAR)
            .ok_or(SandboxFault::MissingOutput)
    }

    fn tick(&mut self) -> Result<(), SandboxFault> {
        self.steps += 1;
        if self.steps > self.config.max_steps {
            return Err(SandboxFault::StepLimit(self.config.max_steps));
        }
        Ok(())
    }

    async fn exec(&mut self, step: &Step) -> Result<(), SandboxFault> {
        match step {
            Step::Set { bind, value } => self.bind(bind, value.clone()),
            Step::Template { bind, text } => {
                let rendered = self.render(text, None)?;
                self.bind(bind, Value::String(rendered))
            }
            Step::Get { bind, from, pointer } => {
                let source = self.lookup(from)?;
                let value = source.pointer(pointer).cloned().ok_or_else(|| {
                    SandboxFault::TypeMismatch(format!("'{from}' has nothing at '{pointer}'"))
                })?;
                self.bind(bind, value)
            }
            Step::Join {
                bind,
                items,
                separator,
            } => {
                let list = self.array(items)?;
                let joined = list.iter().map(as_text).collect::<Vec<_>>().join(separator);
                self.bind(bind, Value::String(joined))
            }
            Step::ReadFile { bind, path } => {
                let path = self.render(path, None)?;
                let content = self.read_granted(&path).await?;
                self.bind(bind, Value::String(content))
            }
            Step::Delegate {
                bind,
                prompt,
                file_paths,
            } => {
                let prompt = self.render(prompt, None)?;
                let paths = file_paths
                    .clone()
                    .unwrap_or_else(|| self.task.envelope.file_paths.clone());
                let value = self.delegate_once(prompt, paths).await?;
                self.bind(bind, value)
            }
            Step::ForEach {
                bind,
                items,
                prompt,
            } => {
                let list = self.array(items)?;
                let mut results = Vec::with_capacity(list.len());
                for item in &list {
                    self.tick()?;
                    let rendered = self.render(prompt, Some(item))?;
                    let paths = self.task.envelope.file_paths.clone();
                    results.push(self.delegate_once(rendered, paths).await?);
                }
                self.bind(bind, Value::Array(results))
            }
            Step::Fail { message } => {
                let message = self.render(message, None)?;
                Err(SandboxFault::Explicit(message))
            }
            Step::Finish { result, complete } => {
                let result = self.resolve_operand(result)?;
                let output = json!({ "result": result, "complete": complete });
                self.check_size(OUTPUT_VAR, &output)?;
                self.namespace.insert(OUTPUT_VAR.to_string(), output);
                Ok(())
            }
        }
    }

    fn bind(&mut self, name: &str, value: Value) -> Result<(), SandboxFault> {
        if name == OUTPUT_VAR {
            return Err(SandboxFault::ReservedName(name.to_string()));
        }
        self.check_size(name, &value)?;
        self.namespace.insert(name.to_string(), value);
        Ok(())
    }

    fn check_size(&self, name: &str, value: &Value) -> Result<(), SandboxFault> {
        let bytes = value.to_string().len();
        if bytes > self.config.max_value_bytes {
            return Err(SandboxFault::ValueTooLarge {
                name: name.to_string(),
                bytes,
                max: self.config.max_value_bytes,
            });
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<&Value, SandboxFault> {
        self.namespace
            .get(name)
            .ok_or_else(|| SandboxFault::UnboundVariable(name.to_string()))
    }

    fn array(&self, name: &str) -> Result<Vec<Value>, SandboxFault> {
        match self.lookup(name)? {
            Value::Array(items) => Ok(items.clone()),
            other => Err(SandboxFault::TypeMismatch(format!(
                "'{name}' is not an array: {other}"
            ))),
        }
    }

    /// Resolve a dotted path such as `report.rows.0`; `item` is only bound inside `for_each`
    fn resolve_path(&self, path: &str, item: Option<&Value>) -> Result<Value, SandboxFault> {
        let mut segments = path.split('.');
        let head = segments.next().unwrap_or_default();
        let mut current = match (head, item) {
            ("item", Some(item)) => item,
            _ => self.lookup(head)?,
        };
        for seg in segments {
            let next = match current {
                Value::Object(map) => map.get(seg),
                Value::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            current = next.ok_or_else(|| SandboxFault::UnboundVariable(path.to_string()))?;
        }
        Ok(current.clone())
    }

    /// Replace every `{{path}}` placeholder in `text`
    pub fn render(&self, text: &str, item: Option<&Value>) -> Result<String, SandboxFault> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                out.push_str(&rest[start..]);
                return Ok(out);
            };
            let value = self.resolve_path(after[..end].trim(), item)?;
            out.push_str(&as_text(&value));
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }

    /// A lone `{{path}}` yields the referenced value unchanged, a string with other text
    /// around its placeholders is rendered, anything else is taken literally
    fn resolve_operand(&self, operand: &Value) -> Result<Value, SandboxFault> {
        match operand {
            Value::String(s) => match lone_placeholder(s) {
                Some(path) => self.resolve_path(path, None),
                None if s.contains("{{") => Ok(Value::String(self.render(s, None)?)),
                None => Ok(operand.clone()),
            },
            other => Ok(other.clone()),
        }
    }

    async fn read_granted(&self, path: &str) -> Result<String, SandboxFault> {
        if !self.task.envelope.file_paths.iter().any(|p| p == path) {
            return Err(SandboxFault::FileNotGranted(path.to_string()));
        }
        let io_fault = |message: String| SandboxFault::Io {
            path: path.to_string(),
            message,
        };
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| io_fault(e.to_string()))?;
        if meta.len() > self.config.max_file_bytes as u64 {
            return Err(SandboxFault::FileTooLarge {
                path: path.to_string(),
                bytes: meta.len(),
                max: self.config.max_file_bytes,
            });
        }
        let doc = ingest_file(Path::new(path))
            .await
            .map_err(|e| io_fault(e.to_string()))?;
        Ok(doc.content)
    }

    async fn delegate_once(
        &mut self,
        prompt: String,
        file_paths: Vec<String>,
    ) -> Result<Value, SandboxFault> {
        // A child may narrow the grant but never widen it
        if let Some(path) = file_paths
            .iter()
            .find(|p| !self.task.envelope.file_paths.contains(p))
        {
            return Err(SandboxFault::FileNotGranted(path.clone()));
        }
        if self.delegations >= self.config.max_delegations {
            return Err(SandboxFault::DelegationLimit(self.config.max_delegations));
        }
        self.delegations += 1;

        let child = self.task.envelope.child(prompt, file_paths);
        debug!(target: "sandbox", depth = child.depth, "Delegating sub-task");
        match self.delegate.delegate(child).await {
            Ok(res) => {
                self.trace.push(format!(
                    "  delegate -> complete={}",
                    res.is_answered()
                ));
                Ok(json!({ "result": res.result, "complete": res.is_answered() }))
            }
            Err(FusionError::DepthExceeded { depth, max }) => {
                Err(SandboxFault::DepthExceeded { depth, max })
            }
            Err(e) => Err(SandboxFault::DelegationFailed(e.to_string())),
        }
    }
}

fn lone_placeholder(text: &str) -> Option<&str> {
    let inner = text.trim().strip_prefix("{{")?.strip_suffix("}}")?;
    (!inner.contains("{{") && !inner.contains("}}")).then(|| inner.trim())
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
