use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ToolResult;
use crate::store::VectorStore;

/// JSON type expected for an argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParameterType {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParameterType::String => value.is_string(),
            ParameterType::Integer => value.is_i64() || value.is_u64(),
            ParameterType::Number => value.is_number(),
            ParameterType::Boolean => value.is_boolean(),
            ParameterType::Array => value.is_array(),
            ParameterType::Object => value.is_object(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    #[serde(rename = "type")]
    pub kind: ParameterType,
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

impl ParameterSpec {
    pub fn required(kind: ParameterType, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(kind: ParameterType, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            required: false,
        }
    }
}

pub type ParameterMap = BTreeMap<String, ParameterSpec>;

/// Persisted form of a tool: `{name, description, parameters}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: ParameterMap,
}

/// What a tool may touch during one call
#[derive(Clone)]
pub struct ToolContext {
    pub store: VectorStore,
    /// Collection writes go to
    pub collection: String,
    /// Files attached to the envelope being resolved
    pub attachments: Vec<String>,
}

/// The core trait for all tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of the tool (e.g., "file_upload")
    fn name(&self) -> String;

    /// A human-readable description of what the tool does
    fn description(&self) -> String;

    /// Declared arguments, validated by the registry before `call`
    fn parameters(&self) -> ParameterMap;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name(),
            description: self.description(),
            parameters: self.parameters(),
        }
    }

    /// Execute the tool with already validated arguments
    async fn call(&self, ctx: &ToolContext, arguments: Value) -> ToolResult<Value>;
}
