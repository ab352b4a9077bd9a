//! The user-visible conversation log: who invoked whom, with what, and
//! what came back — independent of the internal per-turn `Context`.

use uuid::Uuid;

/// Which half of a forward/return pair this entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Forward,
    Return,
}

/// One entry of the process-visible message log. A `call_id` links a
/// `Forward` entry (user or agent invoking another agent) to its eventual
/// `Return` entry.
#[derive(Debug, Clone)]
pub struct Message {
    pub message_type: MessageType,
    pub sender: String,
    pub receiver: String,
    pub content: String,
    pub call_id: String,
}

impl Message {
    pub fn forward(sender: impl Into<String>, receiver: impl Into<String>, content: impl Into<String>) -> Self {
        Self::forward_with_call_id(sender, receiver, content, Uuid::new_v4().to_string())
    }

    /// A `Forward` entry carrying a pre-minted `call_id`, for a caller that
    /// needs the same id shared with other events recorded before the
    /// matching `Return` exists (e.g. event-log correlation).
    pub fn forward_with_call_id(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        content: impl Into<String>,
        call_id: impl Into<String>,
    ) -> Self {
        Self {
            message_type: MessageType::Forward,
            sender: sender.into(),
            receiver: receiver.into(),
            content: content.into(),
            call_id: call_id.into(),
        }
    }

    /// A `Return` entry paired with an existing forward's `call_id`.
    pub fn return_with_call_id(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        content: impl Into<String>,
        call_id: impl Into<String>,
    ) -> Self {
        Self {
            message_type: MessageType::Return,
            sender: sender.into(),
            receiver: receiver.into(),
            content: content.into(),
            call_id: call_id.into(),
        }
    }

    /// Truncated to `max_len` characters (plus an ellipsis marker), for
    /// embedding a preview into an `AgentEvent`'s details without carrying
    /// the full content twice.
    pub fn preview(text: &str, max_len: usize) -> String {
        if text.chars().count() <= max_len {
            text.to_string()
        } else {
            let truncated: String = text.chars().take(max_len).collect();
            format!("{}...", truncated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_mints_a_fresh_call_id() {
        let a = Message::forward("user", "agent", "hi");
        let b = Message::forward("user", "agent", "hi");
        assert_ne!(a.call_id, b.call_id);
    }

    #[test]
    fn forward_with_call_id_reuses_the_given_id_instead_of_minting_one() {
        let forward = Message::forward_with_call_id("user", "agent", "hi", "shared-id");
        assert_eq!(forward.call_id, "shared-id");
    }

    #[test]
    fn return_reuses_given_call_id() {
        let forward = Message::forward("user", "agent", "hi");
        let ret = Message::return_with_call_id("agent", "user", "bye", forward.call_id.clone());
        assert_eq!(ret.call_id, forward.call_id);
    }

    #[test]
    fn preview_truncates_long_text() {
        let long = "a".repeat(300);
        let preview = Message::preview(&long, 200);
        assert_eq!(preview.len(), 203);
    }

    #[test]
    fn preview_leaves_short_text_untouched() {
        assert_eq!(Message::preview("short", 200), "short");
    }
}
