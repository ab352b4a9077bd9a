//! The normalized result of one adapter call: text content plus tool calls.

use crate::cloudllm::context::ToolCall;
use regex::Regex;
use std::sync::OnceLock;

/// Matches a maximal `<think>…</think>` (or `thinking`/`reason`/`reasoning`)
/// block, including one left unclosed at end-of-string. `(?s)` gives `.`
/// DOTALL semantics so multi-line reasoning blocks are matched whole.
fn reasoning_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<(think|thinking|reason|reasoning)>.*?(?:</\1>|$)").expect("valid regex")
    })
}

/// Strip every reasoning block from `content` and trim the remainder.
pub fn content_outside_reasoning(content: &str) -> String {
    reasoning_tag_re().replace_all(content, "").trim().to_string()
}

/// What an LLM adapter produced for one turn: optional text plus zero or
/// more tool calls, in vendor-issued (or Google-synthesized) order.
#[derive(Debug, Clone)]
pub struct LLMResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl LLMResponse {
    pub fn new(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self { content, tool_calls }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::new(Some(content.into()), Vec::new())
    }

    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self::new(None, tool_calls)
    }

    /// `content` with every reasoning block removed, or `None` if there was
    /// no content to begin with, or stripping left nothing behind.
    ///
    /// This is a read-side transform only — the `Context` this response is
    /// appended to always stores `content` verbatim, markup included.
    pub fn content_without_reasoning(&self) -> Option<String> {
        let content = self.content.as_ref()?;
        let stripped = content_outside_reasoning(content);
        if stripped.is_empty() {
            None
        } else {
            Some(stripped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[test]
    fn strips_closed_think_block() {
        let resp = LLMResponse::text("<think>deep</think>The answer is 42.");
        assert_eq!(
            resp.content_without_reasoning(),
            Some("The answer is 42.".to_string())
        );
        assert_eq!(resp.content.as_deref(), Some("<think>deep</think>The answer is 42."));
    }

    #[test]
    fn unclosed_tag_consumes_to_end() {
        let resp = LLMResponse::text("before <reasoning>never closes");
        assert_eq!(resp.content_without_reasoning(), Some("before".to_string()));
    }

    #[test]
    fn reasoning_only_yields_none() {
        let resp = LLMResponse::text("<think>only this</think>");
        assert_eq!(resp.content_without_reasoning(), None);
    }

    #[test]
    fn no_content_yields_none() {
        let resp = LLMResponse::new(None, vec![ToolCall::new("c1", "finish", Map::new())]);
        assert_eq!(resp.content_without_reasoning(), None);
    }

    #[test]
    fn untagged_content_passes_through_trimmed() {
        let resp = LLMResponse::text("  plain text  ");
        assert_eq!(resp.content_without_reasoning(), Some("plain text".to_string()));
    }
}
