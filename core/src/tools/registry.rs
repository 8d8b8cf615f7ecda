use super::error::{ToolError, ToolResult};
use super::traits::{ParameterMap, Tool, ToolContext, ToolDescriptor};
use dashmap::DashMap;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Result of a dispatch as seen by the solver.
///
/// Failures are data: the payload is folded back into the model's context.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Succeeded(Value),
    /// `{error: true, tool, kind, message}`
    Failed(Value),
}

impl ToolOutcome {
    pub fn failure_payload(tool: &str, err: &ToolError) -> Value {
        json!({
            "error": true,
            "tool": tool,
            "kind": err.kind(),
            "message": err.to_string(),
        })
    }
}

/// A registry for managing available tools
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Arc<DashMap<String, Arc<dyn Tool>>>,
    call_timeout: Duration,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(call_timeout: Duration) -> Self {
        Self {
            tools: Arc::new(DashMap::new()),
            call_timeout,
        }
    }

    /// Register a new tool; a later registration under the same name replaces the earlier one
    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name();
        info!(target: "tool_registry", tool = %name, "Registering tool");
        if self.tools.insert(name.clone(), tool).is_some() {
            debug!(target: "tool_registry", tool = %name, "Replaced existing tool");
        }
    }

    /// Get a tool by exact name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|t| t.clone())
    }

    /// List all registered tools, ordered by name
    pub fn list_tools(&self) -> Vec<Arc<dyn Tool>> {
        let mut tools: Vec<Arc<dyn Tool>> = self.tools.iter().map(|t| t.clone()).collect();
        tools.sort_by_key(|t| t.name());
        tools
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.list_tools().iter().map(|t| t.descriptor()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Check `arguments` against the declared schema; `null` counts as no arguments
    pub fn validate(params: &ParameterMap, arguments: Value) -> ToolResult<Value> {
        let args = match arguments {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "arguments must be an object, got {other}"
                )))
            }
        };

        for key in args.keys() {
            if !params.contains_key(key) {
                return Err(ToolError::InvalidArguments(format!(
                    "unexpected argument '{key}'"
                )));
            }
        }
        for (name, spec) in params {
            match args.get(name) {
                None | Some(Value::Null) if spec.required => {
                    return Err(ToolError::InvalidArguments(format!(
                        "missing required argument '{name}'"
                    )))
                }
                Some(v) if !v.is_null() && !spec.kind.matches(v) => {
                    return Err(ToolError::InvalidArguments(format!(
                        "argument '{name}' must be of type {:?}",
                        spec.kind
                    )))
                }
                _ => {}
            }
        }
        Ok(Value::Object(args))
    }

    /// Call a tool by name with validation and timeout
    #[tracing::instrument(skip(self, ctx, arguments), fields(tool.name = %name))]
    pub async fn call(&self, name: &str, ctx: &ToolContext, arguments: Value) -> ToolResult<Value> {
        let start_time = Instant::now();

        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let arguments = Self::validate(&tool.parameters(), arguments)?;

        debug!(target: "tool_registry", tool = %name, "Invoking tool");

        let result = match timeout(self.call_timeout, tool.call(ctx, arguments)).await {
            Ok(res) => res,
            Err(_) => {
                warn!(target: "tool_registry", tool = %name, "Tool execution timed out");
                Err(ToolError::Timeout(self.call_timeout.as_millis() as u64))
            }
        };

        let latency_ms = start_time.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => debug!(target: "tool_registry", tool = %name, latency_ms, "Tool succeeded"),
            Err(e) => {
                warn!(target: "tool_registry", tool = %name, latency_ms, error = %e, "Tool execution failed")
            }
        }

        result
    }

    /// Dispatch without retries, turning every failure into a structured payload
    pub async fn invoke(&self, name: &str, arguments: Value, ctx: &ToolContext) -> ToolOutcome {
        match self.call(name, ctx, arguments).await {
            Ok(value) => ToolOutcome::Succeeded(value),
            Err(e) => ToolOutcome::Failed(ToolOutcome::failure_payload(name, &e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::traits::{ParameterSpec, ParameterType};

    fn params() -> ParameterMap {
        let mut p = ParameterMap::new();
        p.insert(
            "information".into(),
            ParameterSpec::required(ParameterType::String, "text"),
        );
        p.insert(
            "tags".into(),
            ParameterSpec::optional(ParameterType::Array, "labels"),
        );
        p
    }

    #[test]
    fn null_arguments_only_pass_without_required_params() {
        assert!(ToolRegistry::validate(&ParameterMap::new(), Value::Null).is_ok());
        assert!(matches!(
            ToolRegistry::validate(&params(), Value::Null),
            Err(ToolError::InvalidArguments(_))
        ));
    }

    #[test]
    fn rejects_wrong_types_and_unknown_keys() {
        let wrong = ToolRegistry::validate(&params(), json!({"information": 3}));
        assert!(matches!(wrong, Err(ToolError::InvalidArguments(_))));

        let extra = ToolRegistry::validate(&params(), json!({"information": "x", "color": "red"}));
        assert!(matches!(extra, Err(ToolError::InvalidArguments(_))));

        let ok = ToolRegistry::validate(&params(), json!({"information": "x", "tags": null}));
        assert!(ok.is_ok());
    }

    #[test]
    fn failure_payload_shape() {
        let payload =
            ToolOutcome::failure_payload("nope", &ToolError::UnknownTool("nope".into()));
        assert_eq!(payload["error"], true);
        assert_eq!(payload["kind"], "unknown_tool");
        assert_eq!(payload["tool"], "nope");
    }
}
