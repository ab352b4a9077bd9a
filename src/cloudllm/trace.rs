//! Span-tree reconstruction from an [`crate::cloudllm::EventLog`].

use serde_json::{Map, Value};

use crate::cloudllm::event::{AgentEvent, EventLog, EventType};

/// One reconstructed turn interval. Children are sub-agent turns spawned via
/// `call_agent` during this span's lifetime.
#[derive(Debug, Clone)]
pub struct Span {
    pub agent_name: String,
    pub call_id: String,
    pub parent_call_id: Option<String>,
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub children: Vec<Span>,
    pub tool_calls: Vec<Map<String, Value>>,
    pub result: Option<String>,
}

impl Span {
    /// `end_time - start_time` when both are known, `0.0` otherwise.
    pub fn duration(&self) -> f64 {
        self.end_time.map_or(0.0, |end| end - self.start_time)
    }
}

/// A forest of [`Span`]s reconstructed from a run's [`EventLog`]. Roots are
/// spans with no parent — ordinarily just the entry agent's turn.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    pub roots: Vec<Span>,
}

impl Trace {
    pub fn from_event_log(log: &EventLog) -> Self {
        let events: Vec<&AgentEvent> = log.events().iter().collect();

        let mut spans: Vec<Span> = events
            .iter()
            .filter(|e| e.event_type == EventType::AgentCall)
            .map(|e| Span {
                agent_name: e.agent_name.clone(),
                call_id: e.call_id.clone(),
                parent_call_id: e.parent_call_id.clone(),
                start_time: e.timestamp,
                end_time: None,
                children: Vec::new(),
                tool_calls: Vec::new(),
                result: None,
            })
            .collect();

        for span in &mut spans {
            for event in &events {
                match event.event_type {
                    EventType::AgentReturn | EventType::Finish if event.call_id == span.call_id => {
                        span.end_time = Some(event.timestamp);
                        if let Some(Value::String(output)) = event.details.get("output") {
                            span.result = Some(output.clone());
                        }
                    }
                    EventType::ToolExec if event.call_id == span.call_id => {
                        span.tool_calls.push(event.details.clone());
                    }
                    _ => {}
                }
            }
        }

        // Nest children under their parent by call_id, innermost-first so a
        // grandchild's own children are already attached before it is moved.
        let mut by_depth: Vec<Span> = spans;
        let mut roots = Vec::new();
        while !by_depth.is_empty() {
            let leaf_positions: Vec<usize> = by_depth
                .iter()
                .enumerate()
                .filter(|(_, s)| !by_depth.iter().any(|other| other.parent_call_id.as_deref() == Some(s.call_id.as_str())))
                .map(|(i, _)| i)
                .collect();

            let mut leaves: Vec<Span> = leaf_positions
                .into_iter()
                .rev()
                .map(|i| by_depth.remove(i))
                .collect();

            for leaf in leaves.drain(..) {
                match leaf.parent_call_id.clone() {
                    Some(parent_id) => {
                        if let Some(parent) = by_depth.iter_mut().find(|s| s.call_id == parent_id) {
                            parent.children.push(leaf);
                        } else {
                            roots.push(leaf);
                        }
                    }
                    None => roots.push(leaf),
                }
            }
        }

        roots.sort_by(|a, b| a.start_time.partial_cmp(&b.start_time).unwrap_or(std::cmp::Ordering::Equal));
        for root in &mut roots {
            root.children
                .sort_by(|a, b| a.start_time.partial_cmp(&b.start_time).unwrap_or(std::cmp::Ordering::Equal));
        }

        Self { roots }
    }

    /// An ASCII rendering of the span forest, `└──`/`├──` connectors and a
    /// `⚡` marker next to any span that dispatched tool calls.
    pub fn print_tree(&self) -> String {
        let mut out = String::new();
        for (i, root) in self.roots.iter().enumerate() {
            let is_last = i == self.roots.len() - 1;
            Self::format_span(root, "", is_last, &mut out);
        }
        out
    }

    fn format_span(span: &Span, prefix: &str, is_last: bool, out: &mut String) {
        let connector = if is_last { "└── " } else { "├── " };
        let marker = if span.tool_calls.is_empty() { "" } else { " ⚡" };
        out.push_str(&format!(
            "{}{}{} ({:.3}s){}\n",
            prefix,
            connector,
            span.agent_name,
            span.duration(),
            marker
        ));
        let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
        for (i, child) in span.children.iter().enumerate() {
            let child_is_last = i == span.children.len() - 1;
            Self::format_span(child, &child_prefix, child_is_last, out);
        }
    }
}
