/// Placeholder in the prompt template that receives the item's original text.
pub const TEXT_PLACEHOLDER: &str = "{{text}}";

/// Template used when the configured one is empty.
pub const FALLBACK_PROMPT_TEMPLATE: &str = "Original Conversation:\n{{text}}";

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are an expert conversation rewriter.
Your goal is to improve the clarity, tone, and grammar of the provided conversation snippets while retaining the original meaning.

Reason step by step before answering:
1. Analyze the original text for flaws, ambiguity, or tonal issues.
2. Plan the rewriting strategy.
3. Provide the rewritten version.

Output format (follow it exactly unless native thinking is enabled):
---REASONING---
[Your step-by-step analysis here]
---REWRITTEN---
[The final rewritten text here]";

pub const DEFAULT_PROMPT_TEMPLATE: &str = "Original Conversation:
{{text}}

Please analyze and rewrite this following the system instructions.";

/// Build the user prompt for one item.
///
/// Only the first `{{text}}` occurrence is substituted. An empty template
/// falls back to [`FALLBACK_PROMPT_TEMPLATE`].
pub fn render(template: &str, text: &str) -> String {
    let template = if template.trim().is_empty() {
        FALLBACK_PROMPT_TEMPLATE
    } else {
        template
    };
    template.replacen(TEXT_PLACEHOLDER, text, 1)
}

/// Whether `template` will actually carry the item text.
pub fn has_placeholder(template: &str) -> bool {
    template.trim().is_empty() || template.contains(TEXT_PLACEHOLDER)
}
