use serde_json::Value;

use crate::llm::{ModelDecision, ToolCall};

/// States of the resolution machine
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionState {
    Retrieve,
    ToolDispatch(ToolCall),
    /// Search the web, then re-ask; `prior` is followed if that yields nothing new
    WebFallback { prior: Box<ModelDecision> },
    Synthesize,
    Done(Value),
    Unresolved(Value),
}

impl ResolutionState {
    pub fn name(&self) -> &'static str {
        match self {
            ResolutionState::Retrieve => "RETRIEVE",
            ResolutionState::ToolDispatch(_) => "TOOL_DISPATCH",
            ResolutionState::WebFallback { .. } => "WEB_FALLBACK",
            ResolutionState::Synthesize => "SYNTHESIZE",
            ResolutionState::Done(_) => "DONE",
            ResolutionState::Unresolved(_) => "UNRESOLVED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ResolutionState::Done(_) | ResolutionState::Unresolved(_))
    }

    /// Successor of a classification once web fallback has been used up
    pub fn after_web(decision: ModelDecision) -> Self {
        match decision {
            ModelDecision::Answered { result } => ResolutionState::Done(result),
            ModelDecision::Tool { tool } => ResolutionState::ToolDispatch(tool),
            ModelDecision::Insufficient { .. } => ResolutionState::Synthesize,
        }
    }

    /// Successor of the first classification
    pub fn after_retrieval(decision: ModelDecision) -> Self {
        match decision {
            ModelDecision::Answered { result } => ResolutionState::Done(result),
            ModelDecision::Tool { tool } => ResolutionState::ToolDispatch(tool),
            insufficient @ ModelDecision::Insufficient { .. } => ResolutionState::WebFallback {
                prior: Box::new(insufficient),
            },
        }
    }
}
