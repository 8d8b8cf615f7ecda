//! Wire format of model-authored routines.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reply to a synthesis prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SynthesisReply {
    Routine(Routine),
    /// The model could not write a routine at all
    Failed {
        #[serde(default)]
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Routine {
    /// Sub-task decomposition, kept for the trace
    #[serde(default)]
    pub plan: Vec<String>,
    pub steps: Vec<Step>,
}

fn default_separator() -> String {
    "\n".to_string()
}

fn default_complete() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Set {
        bind: String,
        value: Value,
    },
    Template {
        bind: String,
        text: String,
    },
    Get {
        bind: String,
        from: String,
        #[serde(default)]
        pointer: String,
    },
    Join {
        bind: String,
        items: String,
        #[serde(default = "default_separator")]
        separator: String,
    },
    ReadFile {
        bind: String,
        path: String,
    },
    Delegate {
        bind: String,
        prompt: String,
        /// Defaults to the parent's attachments
        #[serde(default)]
        file_paths: Option<Vec<String>>,
    },
    ForEach {
        bind: String,
        items: String,
        prompt: String,
    },
    Fail {
        message: String,
    },
    Finish {
        result: Value,
        #[serde(default = "default_complete")]
        complete: bool,
    },
}

impl Step {
    pub fn op(&self) -> &'static str {
        match self {
            Step::Set { .. } => "set",
            Step::Template { .. } => "template",
            Step::Get { .. } => "get",
            Step::Join { .. } => "join",
            Step::ReadFile { .. } => "read_file",
            Step::Delegate { .. } => "delegate",
            Step::ForEach { .. } => "for_each",
            Step::Fail { .. } => "fail",
            Step::Finish { .. } => "finish",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::parse_contract;

    #[test]
    fn parses_routine_and_defaults() {
        let reply = r#"{"status":"routine","steps":[
            {"op":"delegate","bind":"a","prompt":"sub"},
            {"op":"join","bind":"b","items":"a"},
            {"op":"finish","result":"{{b}}"}]}"#;
        let parsed: SynthesisReply = parse_contract(reply).unwrap();
        let SynthesisReply::Routine(routine) = parsed else {
            panic!("expected routine");
        };
        assert!(routine.plan.is_empty());
        assert_eq!(routine.steps.len(), 3);
        assert!(matches!(&routine.steps[0], Step::Delegate { file_paths: None, .. }));
        assert!(matches!(&routine.steps[1], Step::Join { separator, .. } if separator == "\n"));
        assert!(matches!(&routine.steps[2], Step::Finish { complete: true, .. }));
    }

    #[test]
    fn unknown_ops_are_rejected() {
        let reply = r#"{"status":"routine","steps":[{"op":"exec","cmd":"rm -rf /"}]}"#;
        assert!(parse_contract::<SynthesisReply>(reply).is_err());
    }

    #[test]
    fn failed_reply() {
        let parsed: SynthesisReply =
            parse_contract(r#"{"status":"failed","reason":"needs a GPU"}"#).unwrap();
        assert_eq!(
            parsed,
            SynthesisReply::Failed {
                reason: "needs a GPU".into()
            }
        );
    }
}
