//! End-to-end event/trace invariants: debug gating and causal
//! `parent_call_id` linkage across a recursive run.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use cloudllm::{
    Agent, Context, EventType, LLMResponse, Provider, ProviderAdapter, ProviderError, ProviderKind,
    Router, Runtime, ToolCall,
};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

struct ScriptedAdapter {
    responses: Mutex<VecDeque<LLMResponse>>,
}

impl ScriptedAdapter {
    fn new(responses: Vec<LLMResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
        }
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    async fn call(
        &self,
        _ctx: &Context,
        _tool_schemas: &[Value],
        _agent: &Agent,
        _provider: &Provider,
    ) -> Result<LLMResponse, ProviderError> {
        self.responses
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| ProviderError::new("scripted", "exhausted"))
    }
}

fn finish(message: &str) -> LLMResponse {
    let mut args = Map::new();
    args.insert("message".to_string(), Value::String(message.to_string()));
    LLMResponse::tool_calls(vec![ToolCall::new("f1", "finish", args)])
}

fn call_agent(target: &str, message: &str) -> LLMResponse {
    let mut args = Map::new();
    args.insert("agent_name".to_string(), Value::String(target.to_string()));
    args.insert("message".to_string(), Value::String(message.to_string()));
    LLMResponse::tool_calls(vec![ToolCall::new("ca1", "call_agent", args)])
}

fn router_with(responses: Vec<LLMResponse>) -> Router {
    let agents = vec![
        Agent::new("lead", "Leads the work.", "m", "p"),
        Agent::new("helper", "Helps out.", "m", "p"),
    ];
    let providers = vec![Provider::new("p", ProviderKind::OpenAi, "sk-test")];
    Router::new(agents, Vec::new(), providers)
        .with_adapter(ProviderKind::OpenAi, Arc::new(ScriptedAdapter::new(responses)))
}

#[tokio::test]
async fn debug_false_yields_no_trace_or_event_log_but_still_populates_messages() {
    let router = Arc::new(router_with(vec![finish("done")]));
    let runtime = Runtime::new(router);
    let result = runtime.execute("lead", "go", false).await.unwrap();

    assert!(result.trace.is_none());
    assert!(result.event_log.is_none());
    assert_eq!(result.messages.len(), 2);
}

#[tokio::test]
async fn debug_true_captures_a_trace_and_an_event_log() {
    let router = Arc::new(router_with(vec![finish("done")]));
    let runtime = Runtime::new(router);
    let result = runtime.execute("lead", "go", true).await.unwrap();

    assert!(result.trace.is_some());
    assert!(result.event_log.is_some());
    assert!(!result.event_log.unwrap().is_empty());
}

#[tokio::test]
async fn nested_delegation_keeps_every_parent_call_id_causally_linked() {
    let router = Arc::new(router_with(vec![
        call_agent("helper", "please help"),
        finish("helped"),
        finish("done with help"),
    ]));
    let runtime = Runtime::new(router);
    let result = runtime.execute("lead", "kick things off", true).await.unwrap();
    assert_eq!(result.output, "done with help");

    let log = result.event_log.unwrap();
    let seen: HashSet<&str> = log.events().iter().map(|e| e.call_id.as_str()).collect();
    for event in log.events() {
        if let Some(parent) = &event.parent_call_id {
            assert!(
                seen.contains(parent.as_str()),
                "parent_call_id {} was never a recorded call_id",
                parent
            );
        }
    }

    // The reconstructed span tree roots at the entry agent with the
    // delegate nested as its child.
    let trace = log_to_trace(&log);
    assert_eq!(trace.roots.len(), 1);
    assert_eq!(trace.roots[0].agent_name, "lead");
    assert_eq!(trace.roots[0].children.len(), 1);
    assert_eq!(trace.roots[0].children[0].agent_name, "helper");
}

fn log_to_trace(log: &cloudllm::EventLog) -> cloudllm::Trace {
    cloudllm::Trace::from_event_log(log)
}

#[tokio::test]
async fn every_agent_call_event_has_a_matching_agent_return_or_finish() {
    let router = Arc::new(router_with(vec![
        call_agent("helper", "please help"),
        finish("helped"),
        finish("done"),
    ]));
    let runtime = Runtime::new(router);
    let result = runtime.execute("lead", "go", true).await.unwrap();
    let log = result.event_log.unwrap();

    let call_ids: HashSet<&str> = log
        .filter(None, Some(EventType::AgentCall))
        .iter()
        .map(|e| e.call_id.as_str())
        .collect();
    let closed_ids: HashSet<&str> = log
        .events()
        .iter()
        .filter(|e| e.event_type == EventType::AgentReturn || e.event_type == EventType::Finish)
        .map(|e| e.call_id.as_str())
        .collect();
    for call_id in call_ids {
        assert!(
            closed_ids.contains(call_id),
            "agent_call {} never closed with a return or finish",
            call_id
        );
    }
}
