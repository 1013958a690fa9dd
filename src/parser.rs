//! Reasoning/output extraction from raw provider text.
//!
//! The canonical protocol asks the model for two delimited sections:
//!
//! ```text
//! ---REASONING---
//! <analysis>
//! ---REWRITTEN---
//! <final text>
//! ```
//!
//! Parsing never fails. When the protocol is not followed the whole text is
//! the output and the reasoning becomes a placeholder. Reasoning models that
//! wrap their trace in `<think>...</think>` are handled in between.

use serde::{Deserialize, Serialize};

pub const REASONING_MARKER: &str = "---REASONING---";
pub const OUTPUT_MARKER: &str = "---REWRITTEN---";

/// Reasoning placeholder when the vendor reasoned natively and no trace came back as text.
pub const NATIVE_REASONING_PLACEHOLDER: &str =
    "(Native Thinking utilized by model - internal trace)";

/// Reasoning placeholder when the model skipped the reasoning section.
pub const NO_REASONING_PLACEHOLDER: &str = "No explicit reasoning block provided by model.";

const THINK_START: &str = "<think>";
const THINK_END: &str = "</think>";

/// A reasoning segment and an output segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedResponse {
    pub reasoning: String,
    pub output: String,
}

/// Split raw provider text into reasoning and output.
pub fn parse_response(text: &str, native_thinking: bool) -> ParsedResponse {
    if text.contains(REASONING_MARKER) && text.contains(OUTPUT_MARKER) {
        if let Some((before, after)) = text.split_once(OUTPUT_MARKER) {
            return ParsedResponse {
                reasoning: before.replacen(REASONING_MARKER, "", 1).trim().to_string(),
                output: after.trim().to_string(),
            };
        }
    }

    if let Some((thinking, rest)) = extract_think_block(text) {
        return ParsedResponse {
            reasoning: thinking,
            output: rest,
        };
    }

    ParsedResponse {
        reasoning: placeholder(native_thinking).to_string(),
        output: text.to_string(),
    }
}

/// The reasoning placeholder used by the fallback path.
pub fn placeholder(native_thinking: bool) -> &'static str {
    if native_thinking {
        NATIVE_REASONING_PLACEHOLDER
    } else {
        NO_REASONING_PLACEHOLDER
    }
}

/// Pull a non-empty `<think>...</think>` block out of `text`.
///
/// Returns `(thinking, remaining)` with both trimmed, or `None` when there is
/// no complete block or the block is blank.
fn extract_think_block(text: &str) -> Option<(String, String)> {
    let start_idx = text.find(THINK_START)?;
    let end_rel = text[start_idx..].find(THINK_END)?;
    let end_idx = start_idx + end_rel;

    let thinking = text[start_idx + THINK_START.len()..end_idx].trim();
    if thinking.is_empty() {
        return None;
    }

    let mut remaining = String::with_capacity(text.len());
    remaining.push_str(&text[..start_idx]);
    remaining.push_str(&text[end_idx + THINK_END.len()..]);

    Some((thinking.to_string(), remaining.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_protocol() {
        let parsed = parse_response("---REASONING---\nA\n---REWRITTEN---\nB", false);
        assert_eq!(parsed.reasoning, "A");
        assert_eq!(parsed.output, "B");
    }

    #[test]
    fn test_canonical_with_preamble_and_padding() {
        let text = "Sure.\n---REASONING---\n  step one\n  step two \n---REWRITTEN---\n\n Hello there. \n";
        let parsed = parse_response(text, false);
        assert_eq!(parsed.reasoning, "Sure.\n\n  step one\n  step two");
        assert_eq!(parsed.output, "Hello there.");
    }

    #[test]
    fn test_split_on_first_output_marker() {
        let text = "---REASONING---\nA\n---REWRITTEN---\nB\n---REWRITTEN---\nC";
        let parsed = parse_response(text, false);
        assert_eq!(parsed.reasoning, "A");
        assert_eq!(parsed.output, "B\n---REWRITTEN---\nC");
    }

    #[test]
    fn test_no_markers_fallback() {
        let parsed = parse_response("just a rewrite", false);
        assert_eq!(parsed.reasoning, NO_REASONING_PLACEHOLDER);
        assert_eq!(parsed.output, "just a rewrite");
    }

    #[test]
    fn test_native_thinking_fallback() {
        let parsed = parse_response("just a rewrite", true);
        assert_eq!(parsed.reasoning, NATIVE_REASONING_PLACEHOLDER);
        assert_eq!(
            parsed.reasoning,
            "(Native Thinking utilized by model - internal trace)"
        );
        assert_eq!(parsed.output, "just a rewrite");
    }

    #[test]
    fn test_only_output_marker_is_fallback() {
        let text = "---REWRITTEN---\nB";
        let parsed = parse_response(text, false);
        assert_eq!(parsed.reasoning, NO_REASONING_PLACEHOLDER);
        assert_eq!(parsed.output, text);
    }

    #[test]
    fn test_empty_text() {
        let parsed = parse_response("", false);
        assert_eq!(parsed.reasoning, NO_REASONING_PLACEHOLDER);
        assert_eq!(parsed.output, "");
    }

    #[test]
    fn test_think_block() {
        let parsed = parse_response("<think>tone is rude</think>\nPlease help me.", false);
        assert_eq!(parsed.reasoning, "tone is rude");
        assert_eq!(parsed.output, "Please help me.");
    }

    #[test]
    fn test_blank_think_block_falls_back() {
        let text = "<think>  </think>Please help me.";
        let parsed = parse_response(text, true);
        assert_eq!(parsed.reasoning, NATIVE_REASONING_PLACEHOLDER);
        assert_eq!(parsed.output, text);
    }

    #[test]
    fn test_unclosed_think_block_falls_back() {
        let text = "<think>never closed";
        let parsed = parse_response(text, false);
        assert_eq!(parsed.output, text);
    }

    #[test]
    fn test_markers_win_over_think_block() {
        let text = "<think>x</think>---REASONING---\nA\n---REWRITTEN---\nB";
        let parsed = parse_response(text, false);
        assert_eq!(parsed.reasoning, "<think>x</think>\nA");
        assert_eq!(parsed.output, "B");
    }
}
