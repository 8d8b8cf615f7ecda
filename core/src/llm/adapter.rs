use crate::context::{PromptBundle, TokenBudget};
use serde_json::json;

/// Convert PromptBundle into both chat messages and a single fused text for the Responses API
pub fn promptbundle_to_messages_and_text(
    bundle: &PromptBundle,
    budget: TokenBudget,
) -> (Vec<serde_json::Value>, String) {
    // Approximate token->char ratio; conservative safety factor ~4 chars/token
    let char_budget = budget.max_input_tokens.saturating_mul(4);

    let system = bundle.system.clone();
    let mut docs: Vec<String> = bundle.context_docs.clone();
    let mut instructions = bundle.instructions.clone();

    // Docs are ordered most relevant first, so drop from the tail
    let doc_len = |docs: &[String]| docs.iter().map(|d| d.len() + 2).sum::<usize>();
    let mut assemble_len = system.len() + doc_len(&docs) + instructions.len();
    while assemble_len > char_budget && !docs.is_empty() {
        if let Some(removed) = docs.pop() {
            assemble_len -= removed.len() + 2;
        }
    }

    let context_block = if docs.is_empty() {
        String::new()
    } else {
        format!("Context:\n{}\n", docs.join("\n\n"))
    };

    // If still too large, truncate instructions
    if assemble_len > char_budget && !instructions.is_empty() {
        // Character-based so we never split a UTF-8 sequence
        let allowed_chars =
            char_budget.saturating_sub(system.chars().count() + context_block.chars().count());
        instructions = instructions.chars().take(allowed_chars).collect();
    }

    let mut messages = Vec::new();
    if !system.is_empty() {
        messages.push(json!({"role": "system", "content": system}));
    }
    if !context_block.is_empty() {
        messages.push(json!({"role": "system", "content": context_block.clone()}));
    }
    if !instructions.is_empty() {
        messages.push(json!({"role": "user", "content": instructions.clone()}));
    }

    let mut fused = String::new();
    if !system.is_empty() {
        fused.push_str("System:\n");
        fused.push_str(&system);
        fused.push_str("\n\n");
    }
    if !context_block.is_empty() {
        fused.push_str(&context_block);
        fused.push('\n');
    }
    if !instructions.is_empty() {
        fused.push_str("User:\n");
        fused.push_str(&instructions);
        fused.push('\n');
    }

    (messages, fused)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PromptKind;

    #[test]
    fn drops_least_relevant_docs_first() {
        let bundle = PromptBundle::new(PromptKind::Classify, "sys", "question")
            .with_context("a".repeat(20))
            .with_context("b".repeat(20));
        let budget = TokenBudget {
            max_input_tokens: 10,
            max_output_tokens: 16,
        };

        let (messages, fused) = promptbundle_to_messages_and_text(&bundle, budget);

        assert!(fused.contains(&"a".repeat(20)));
        assert!(!fused.contains('b'));
        assert_eq!(messages.len(), 3);
    }

    #[test]
    fn truncates_instructions_when_docs_are_gone() {
        let bundle = PromptBundle::new(PromptKind::Classify, "", "x".repeat(100));
        let budget = TokenBudget {
            max_input_tokens: 5,
            max_output_tokens: 16,
        };

        let (messages, _) = promptbundle_to_messages_and_text(&bundle, budget);

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["content"].as_str().map(|s| s.len()), Some(20));
    }
}
