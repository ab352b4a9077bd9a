//! Conversation state threaded through a single agent's turn loop.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A normalized tool call an LLM asked for, independent of vendor wire shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A non-text payload attached to a `user` or `tool` message. Exactly one
/// of `data`/`url` is set; only the Anthropic adapter renders these today
/// (image/* and application/pdf mime types — see `adapters::anthropic`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    pub mime_type: String,
    pub data: Option<String>,
    pub url: Option<String>,
    pub name: Option<String>,
}

impl Attachment {
    pub fn from_base64(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: Some(data.into()),
            url: None,
            name: None,
        }
    }

    pub fn from_url(mime_type: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: None,
            url: Some(url.into()),
            name: None,
        }
    }
}

/// One turn of conversation, tagged by who produced it.
///
/// An enum rather than a flat `{role, content, tool_calls, tool_call_id}`
/// struct: Rust can make "a tool message always carries a `tool_call_id`"
/// and "only an assistant message carries `tool_calls`" structurally
/// impossible to get wrong, instead of leaving the unused fields `None`
/// by convention.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ContextMessage {
    System { content: String },
    User {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attachments: Vec<Attachment>,
    },
    Assistant {
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        tool_name: String,
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attachments: Vec<Attachment>,
    },
}

/// The ordered message history for one agent's turn loop.
///
/// `Context` owns the history; the `add_*` helpers are the only way to
/// append to it, keeping the invariant that a `Tool` message always follows
/// the `Assistant` message whose `tool_calls` it answers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Context {
    messages: Vec<ContextMessage>,
}

impl Context {
    pub fn new() -> Self {
        Self { messages: Vec::new() }
    }

    pub fn with_system(system: impl Into<String>) -> Self {
        let mut ctx = Self::new();
        ctx.messages.push(ContextMessage::System {
            content: system.into(),
        });
        ctx
    }

    pub fn add_user(&mut self, content: impl Into<String>) {
        self.add_user_with_attachments(content, Vec::new());
    }

    pub fn add_user_with_attachments(&mut self, content: impl Into<String>, attachments: Vec<Attachment>) {
        self.messages.push(ContextMessage::User {
            content: content.into(),
            attachments,
        });
    }

    pub fn add_assistant_text(&mut self, content: impl Into<String>) {
        self.messages.push(ContextMessage::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        });
    }

    pub fn add_assistant_tool_calls(&mut self, content: Option<String>, tool_calls: Vec<ToolCall>) {
        self.messages.push(ContextMessage::Assistant { content, tool_calls });
    }

    pub fn add_tool_result(
        &mut self,
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) {
        self.add_tool_result_with_attachments(tool_call_id, tool_name, content, Vec::new());
    }

    pub fn add_tool_result_with_attachments(
        &mut self,
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
        attachments: Vec<Attachment>,
    ) {
        self.messages.push(ContextMessage::Tool {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            content: content.into(),
            attachments,
        });
    }

    /// A read-only, ordered snapshot of everything recorded so far.
    pub fn messages(&self) -> &[ContextMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order() {
        let mut ctx = Context::new();
        ctx.add_user("hi");
        ctx.add_assistant_tool_calls(
            None,
            vec![ToolCall::new("c1", "lookup", Map::new())],
        );
        ctx.add_tool_result("c1", "lookup", "42");
        assert_eq!(ctx.len(), 3);
        match &ctx.messages()[1] {
            ContextMessage::Assistant { tool_calls, .. } => assert_eq!(tool_calls.len(), 1),
            other => panic!("expected assistant message, got {:?}", other),
        }
        match &ctx.messages()[2] {
            ContextMessage::Tool { tool_call_id, .. } => assert_eq!(tool_call_id, "c1"),
            other => panic!("expected tool message, got {:?}", other),
        }
    }

    #[test]
    fn starts_empty_without_system() {
        let ctx = Context::new();
        assert!(ctx.is_empty());
    }
}
