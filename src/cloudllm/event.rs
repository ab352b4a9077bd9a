//! Structured, causally-linked record of everything a [`crate::cloudllm::Runtime`]
//! run did. Populated only when a run is started with `debug=true`.

use std::time::Instant;

use serde_json::{Map, Value};

/// The kind of lifecycle moment an [`AgentEvent`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    LlmCall,
    LlmResponse,
    ToolExec,
    AgentCall,
    AgentReturn,
    Finish,
    Error,
}

impl EventType {
    fn as_str(&self) -> &'static str {
        match self {
            EventType::LlmCall => "llm_call",
            EventType::LlmResponse => "llm_response",
            EventType::ToolExec => "tool_exec",
            EventType::AgentCall => "agent_call",
            EventType::AgentReturn => "agent_return",
            EventType::Finish => "finish",
            EventType::Error => "error",
        }
    }
}

/// One recorded lifecycle moment. `parent_call_id` links a nested
/// `agent_call`/`agent_return`/`tool_exec` pair back to the turn that
/// triggered it; `None` means this event belongs to the root turn.
#[derive(Debug, Clone)]
pub struct AgentEvent {
    pub event_type: EventType,
    pub agent_name: String,
    pub call_id: String,
    pub parent_call_id: Option<String>,
    /// Seconds since the owning `EventLog`'s epoch — monotonic, for
    /// ordering and duration math only. Not a wall-clock timestamp; a
    /// caller wanting one can pair this with its own `SystemTime` capture
    /// at record time.
    pub timestamp: f64,
    pub details: Map<String, Value>,
}

/// Append-only log of every [`AgentEvent`] recorded during one run.
///
/// Owned by a single `Runtime::execute` call; never a process-wide
/// singleton, so concurrent runs never share state.
#[derive(Debug)]
pub struct EventLog {
    epoch: Instant,
    events: Vec<AgentEvent>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            events: Vec::new(),
        }
    }

    pub fn record(
        &mut self,
        event_type: EventType,
        agent_name: impl Into<String>,
        call_id: impl Into<String>,
        parent_call_id: Option<String>,
        details: Map<String, Value>,
    ) {
        self.events.push(AgentEvent {
            event_type,
            agent_name: agent_name.into(),
            call_id: call_id.into(),
            parent_call_id,
            timestamp: self.epoch.elapsed().as_secs_f64(),
            details,
        });
    }

    pub fn events(&self) -> &[AgentEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events matching both filters, if given, in recorded order.
    pub fn filter(&self, agent_name: Option<&str>, event_type: Option<EventType>) -> Vec<&AgentEvent> {
        self.events
            .iter()
            .filter(|e| agent_name.map_or(true, |name| e.agent_name == name))
            .filter(|e| event_type.map_or(true, |t| e.event_type == t))
            .collect()
    }

    /// A human-readable dump, one line per event, useful for debugging a
    /// captured `RunResult.event_log` without matching on variants by hand.
    pub fn format(&self) -> String {
        let mut out = String::new();
        for event in &self.events {
            out.push_str(&format!(
                "[{:>8.3}] {:<14} {:<20} call_id={}",
                event.timestamp,
                event.event_type.as_str(),
                event.agent_name,
                event.call_id,
            ));
            if let Some(parent) = &event.parent_call_id {
                out.push_str(&format!(" parent={}", parent));
            }
            if !event.details.is_empty() {
                out.push_str(&format!(" details={}", Value::Object(event.details.clone())));
            }
            out.push('\n');
        }
        out
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a AgentEvent;
    type IntoIter = std::slice::Iter<'a, AgentEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_by_agent_and_type() {
        let mut log = EventLog::new();
        log.record(EventType::AgentCall, "root", "c1", None, Map::new());
        log.record(EventType::AgentCall, "child", "c2", Some("c1".to_string()), Map::new());
        log.record(EventType::Finish, "child", "c2", Some("c1".to_string()), Map::new());

        assert_eq!(log.filter(Some("child"), None).len(), 2);
        assert_eq!(log.filter(None, Some(EventType::AgentCall)).len(), 2);
        assert_eq!(log.filter(Some("child"), Some(EventType::Finish)).len(), 1);
    }

    #[test]
    fn format_includes_call_id_and_parent() {
        let mut log = EventLog::new();
        log.record(EventType::AgentCall, "root", "c1", None, Map::new());
        let text = log.format();
        assert!(text.contains("agent_call"));
        assert!(text.contains("call_id=c1"));
    }
}
