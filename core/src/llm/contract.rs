//! The closed response schema every classification reply must satisfy.
//!
//! Replies are validated right after the model call. A reply that is not JSON, that
//! carries a `status` outside the enumeration, or that misses a required field is a
//! protocol violation and becomes `FusionError::MalformedModelOutput`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{FusionError, Result};

/// Outcome of a classification call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModelDecision {
    /// The model answered outright
    Answered { result: Value },
    /// The model wants a declared tool invoked
    Tool { tool: ToolCall },
    /// Not enough context yet
    Insufficient {
        #[serde(default)]
        result: Value,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ModelDecision {
    pub fn label(&self) -> &'static str {
        match self {
            ModelDecision::Answered { .. } => "answered",
            ModelDecision::Tool { .. } => "tool",
            ModelDecision::Insufficient { .. } => "insufficient",
        }
    }
}

/// Cut a reply down to its outermost JSON object, dropping code fences and prose
pub fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let unfenced = match trimmed.strip_prefix("```") {
        Some(rest) => {
            let body = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
            body.trim_end().trim_end_matches("```")
        }
        None => trimmed,
    };
    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&unfenced[start..=end])
}

/// Parse a model reply into the expected contract type
pub fn parse_contract<T: DeserializeOwned>(text: &str) -> Result<T> {
    let json = extract_json(text).ok_or_else(|| {
        FusionError::MalformedModelOutput(format!("no JSON object in reply: {}", preview(text)))
    })?;
    serde_json::from_str(json).map_err(|e| {
        FusionError::MalformedModelOutput(format!("{e} in reply: {}", preview(text)))
    })
}

pub fn parse_decision(text: &str) -> Result<ModelDecision> {
    parse_contract(text)
}

fn preview(text: &str) -> String {
    let mut s: String = text.chars().take(200).collect();
    if text.chars().count() > 200 {
        s.push_str("...");
    }
    s
}
