//! Request, envelope and result types flowing through the query solver.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ui::UiHint;

/// Caller-facing request: `{prompt, file_paths, depth?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub prompt: String,
    #[serde(default)]
    pub file_paths: Vec<String>,
    #[serde(default)]
    pub depth: usize,
}

impl QueryRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            file_paths: Vec::new(),
            depth: 0,
        }
    }

    pub fn with_files<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.file_paths = paths.into_iter().map(Into::into).collect();
        self
    }
}

/// Unit of work inside the solver.
///
/// `depth` only ever grows through [`QueryEnvelope::child`], by exactly one per
/// delegation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryEnvelope {
    pub prompt: String,
    pub file_paths: Vec<String>,
    pub depth: usize,
}

impl QueryEnvelope {
    pub fn new(prompt: impl Into<String>, file_paths: Vec<String>) -> Self {
        Self {
            prompt: prompt.into(),
            file_paths,
            depth: 0,
        }
    }

    /// Envelope for a delegated sub-task, one level deeper
    pub fn child(&self, prompt: impl Into<String>, file_paths: Vec<String>) -> Self {
        Self {
            prompt: prompt.into(),
            file_paths,
            depth: self.depth + 1,
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.depth == 0
    }
}

impl From<QueryRequest> for QueryEnvelope {
    fn from(req: QueryRequest) -> Self {
        Self {
            prompt: req.prompt,
            file_paths: req.file_paths,
            depth: req.depth,
        }
    }
}

/// Tri-state completion marker.
///
/// `RouteToTool` is internal to the solver; results leaving it are either
/// `Answered` or `Unresolved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    Answered,
    RouteToTool,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub result: Value,
    pub completion: Completion,
    /// Only populated for top-level envelopes
    pub ui_hint: Option<UiHint>,
}

impl ResolutionResult {
    pub fn answered(result: Value) -> Self {
        Self {
            result,
            completion: Completion::Answered,
            ui_hint: None,
        }
    }

    pub fn unresolved(result: Value) -> Self {
        Self {
            result,
            completion: Completion::Unresolved,
            ui_hint: None,
        }
    }

    pub fn is_answered(&self) -> bool {
        self.completion == Completion::Answered
    }

    pub fn into_response(self) -> QueryResponse {
        let answered = self.is_answered();
        QueryResponse {
            result: self.result,
            complete: answered,
            ui: self.ui_hint,
            error: !answered,
        }
    }
}

/// Caller-facing response: `{result, complete, UI?, error?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub result: Value,
    pub complete: bool,
    #[serde(rename = "UI", default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<UiHint>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl QueryResponse {
    /// Error-shaped response carrying a human-readable explanation
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            result: Value::String(message.into()),
            complete: false,
            ui: None,
            error: true,
        }
    }
}
