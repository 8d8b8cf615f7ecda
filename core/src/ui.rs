//! Presentation hint for top-level results.
//!
//! Purely cosmetic: nothing here can change or fail the result it describes.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::{PromptBundle, PromptKind};
use crate::llm::CompletionModel;
use crate::prompts;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiHint {
    #[default]
    Chat,
    FileUpload,
    Plot,
    Map,
    Dirs,
}

impl UiHint {
    pub const ALL: [UiHint; 5] = [
        UiHint::Chat,
        UiHint::FileUpload,
        UiHint::Plot,
        UiHint::Map,
        UiHint::Dirs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UiHint::Chat => "chat",
            UiHint::FileUpload => "file_upload",
            UiHint::Plot => "plot",
            UiHint::Map => "map",
            UiHint::Dirs => "dirs",
        }
    }

    /// Normalise a raw model reply into a label, if it names one
    pub fn parse_reply(reply: &str) -> Option<UiHint> {
        let cleaned = reply
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c.is_whitespace())
            .to_ascii_lowercase();
        UiHint::ALL.into_iter().find(|h| h.as_str() == cleaned)
    }
}

impl std::fmt::Display for UiHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON rendering of a result cut to `max_chars` characters
pub fn summarize(result: &Value, max_chars: usize) -> String {
    let rendered = match result {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    rendered.chars().take(max_chars).collect()
}

pub struct UiHintSelector {
    llm: Arc<dyn CompletionModel>,
    timeout: Duration,
    summary_chars: usize,
}

impl UiHintSelector {
    pub fn new(llm: Arc<dyn CompletionModel>, timeout: Duration, summary_chars: usize) -> Self {
        Self {
            llm,
            timeout,
            summary_chars,
        }
    }

    /// Best-effort label; every failure degrades to `Chat`
    pub async fn select(&self, result: &Value) -> UiHint {
        let summary = summarize(result, self.summary_chars);
        let bundle = PromptBundle::new(PromptKind::UiHint, prompts::UI_HINT, summary);

        match tokio::time::timeout(self.timeout, self.llm.complete(&bundle)).await {
            Ok(Ok(reply)) => UiHint::parse_reply(&reply).unwrap_or_else(|| {
                tracing::warn!(target: "ui_hint", reply = %reply, "Unknown UI label; using chat");
                UiHint::Chat
            }),
            Ok(Err(e)) => {
                tracing::warn!(target: "ui_hint", error = %e, "UI hint call failed; using chat");
                UiHint::Chat
            }
            Err(_) => {
                tracing::warn!(target: "ui_hint", "UI hint call timed out; using chat");
                UiHint::Chat
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reply_normalisation() {
        assert_eq!(UiHint::parse_reply(" \"File_Upload\"\n"), Some(UiHint::FileUpload));
        assert_eq!(UiHint::parse_reply("`dirs`"), Some(UiHint::Dirs));
        assert_eq!(UiHint::parse_reply("a chart please"), None);
    }

    #[test]
    fn summary_is_bounded() {
        let long = json!({"rows": vec!["x"; 400]});
        assert_eq!(summarize(&long, 500).chars().count(), 500);
        assert_eq!(summarize(&json!("short"), 500), "short");
    }
}
