//! Prompt bundles handed to the completion model.

use serde::{Deserialize, Serialize};

/// Which call site produced a bundle; used for logging and by test doubles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    /// First classification over retrieved records
    Classify,
    /// Second classification after web results were added
    WebClassify,
    /// Routine authoring for the synthesis sandbox
    Synthesize,
    /// Clarifying re-prompt after a reply that broke the response contract
    Repair,
    /// Presentation hint selection
    UiHint,
}

/// Everything the model sees for one call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptBundle {
    pub kind: PromptKind,
    pub system: String,
    /// Ordered most relevant first; the adapter drops from the tail when over budget
    pub context_docs: Vec<String>,
    pub instructions: String,
}

impl PromptBundle {
    pub fn new(kind: PromptKind, system: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            kind,
            system: system.into(),
            context_docs: Vec::new(),
            instructions: instructions.into(),
        }
    }

    pub fn with_context(mut self, doc: impl Into<String>) -> Self {
        let doc = doc.into();
        if !doc.trim().is_empty() {
            self.context_docs.push(doc);
        }
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenBudget {
    pub max_input_tokens: usize,
    pub max_output_tokens: usize,
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            max_input_tokens: 16_384,
            max_output_tokens: 2_048,
        }
    }
}
