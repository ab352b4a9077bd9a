//! Registry of agents, tools, and providers; builds per-agent prompts and
//! tool schemas, and dispatches LLM calls to the right adapter.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::cloudllm::adapters::{AnthropicAdapter, GoogleAdapter, OpenAiAdapter, ProviderAdapter};
use crate::cloudllm::agent::Agent;
use crate::cloudllm::context::Context;
use crate::cloudllm::error::{ProviderError, RoutingError, ToolError};
use crate::cloudllm::llm_response::LLMResponse;
use crate::cloudllm::provider::{Provider, ProviderKind};
use crate::cloudllm::tool::Tool;

/// `call_agent` and `finish` are advertised to every agent's model but are
/// handled by the `Runtime`, never dispatched as a registered `Tool`.
fn sentinel_schemas() -> Vec<Value> {
    vec![
        json!({
            "name": "call_agent",
            "description": "Delegate a subtask to another named agent and wait for its result.",
            "parameters": {
                "type": "object",
                "properties": {
                    "agent_name": {"type": "string", "description": "Name of the agent to delegate to."},
                    "message": {"type": "string", "description": "The message to send to that agent."}
                },
                "required": ["agent_name", "message"]
            }
        }),
        json!({
            "name": "finish",
            "description": "Complete this task and return the final result.",
            "parameters": {
                "type": "object",
                "properties": {
                    "message": {"type": "string", "description": "The final result to return."}
                },
                "required": ["message"]
            }
        }),
    ]
}

/// Holds every agent/tool/provider registered for a run. Read-only once a
/// run starts; the internal adapter cache is the only interior-mutable
/// state, written at most once per `ProviderKind`.
pub struct Router {
    agents: HashMap<String, Agent>,
    tools: HashMap<String, Arc<dyn Tool>>,
    providers: HashMap<String, Provider>,
    adapters: Mutex<HashMap<ProviderKind, Arc<dyn ProviderAdapter>>>,
}

impl Router {
    pub fn new(agents: Vec<Agent>, tools: Vec<Arc<dyn Tool>>, providers: Vec<Provider>) -> Self {
        // Duplicate names last-write-wins; never rejected.
        let agents = agents.into_iter().map(|a| (a.name.clone(), a)).collect();
        let tools = tools.into_iter().map(|t| (t.name().to_string(), t)).collect();
        let providers = providers.into_iter().map(|p| (p.name.clone(), p)).collect();
        Self {
            agents,
            tools,
            providers,
            adapters: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_agent(&self, name: &str) -> Result<&Agent, RoutingError> {
        self.agents
            .get(name)
            .ok_or_else(|| RoutingError::new(format!("no agent registered with name '{}'", name)))
    }

    pub fn get_tool(&self, name: &str) -> Result<&Arc<dyn Tool>, ToolError> {
        self.tools
            .get(name)
            .ok_or_else(|| ToolError::new(name, format!("no tool registered with name '{}'", name)))
    }

    fn other_agents(&self, name: &str) -> Vec<&Agent> {
        let mut others: Vec<&Agent> = self.agents.values().filter(|a| a.name != name).collect();
        others.sort_by(|a, b| a.name.cmp(&b.name));
        others
    }

    /// `You are "<name>". <instructions>` plus, when other agents exist, a
    /// delegation roster and a reminder of the two sentinel tools.
    pub fn build_system_prompt(&self, agent: &Agent) -> String {
        let mut prompt = format!("You are \"{}\". {}", agent.name, agent.instructions);

        let others = self.other_agents(&agent.name);
        if !others.is_empty() {
            prompt.push_str("\n\nAvailable agents:\n");
            for other in &others {
                prompt.push_str(&format!("- {}: {}\n", other.name, other.instructions));
            }
        }

        prompt.push_str("\nUse call_agent to delegate work to other agents.\n");
        prompt.push_str("Use finish to complete your task and return the result.");
        prompt
    }

    /// Every registered tool's schema, followed by the two sentinels in
    /// that fixed order.
    pub fn build_tool_schemas(&self, _agent: &Agent) -> Vec<Value> {
        let mut names: Vec<&String> = self.tools.keys().collect();
        names.sort();
        let mut schemas: Vec<Value> = names
            .into_iter()
            .map(|name| self.tools[name].to_schema())
            .collect();
        schemas.extend(sentinel_schemas());
        schemas
    }

    /// Pre-seed the adapter cache for `kind`, bypassing the real vendor
    /// constructor in [`Router::get_backend`]. Meant for tests that need a
    /// `Runtime` to drive a `Router` against a scripted
    /// [`ProviderAdapter`](crate::cloudllm::adapters::ProviderAdapter)
    /// instead of an HTTP backend; call right after [`Router::new`], before
    /// any `call_llm`/`resolve_adapter` has had a chance to populate the
    /// real entry for that kind.
    pub fn with_adapter(self, kind: ProviderKind, adapter: Arc<dyn ProviderAdapter>) -> Self {
        {
            let mut guard = self
                .adapters
                .try_lock()
                .expect("router adapter cache is uncontended during setup");
            guard.insert(kind, adapter);
        }
        self
    }

    async fn get_backend(&self, kind: ProviderKind) -> Arc<dyn ProviderAdapter> {
        let mut adapters = self.adapters.lock().await;
        adapters
            .entry(kind)
            .or_insert_with(|| -> Arc<dyn ProviderAdapter> {
                match kind {
                    ProviderKind::OpenAi => Arc::new(OpenAiAdapter::new()),
                    ProviderKind::Anthropic => Arc::new(AnthropicAdapter::new()),
                    ProviderKind::Google => Arc::new(GoogleAdapter::new()),
                }
            })
            .clone()
    }

    fn resolve_provider(&self, agent: &Agent) -> Result<&Provider, ProviderError> {
        self.providers.get(&agent.provider).ok_or_else(|| {
            ProviderError::new(
                agent.provider.clone(),
                format!("no provider registered with name '{}'", agent.provider),
            )
        })
    }

    pub async fn call_llm(
        &self,
        agent: &Agent,
        ctx: &Context,
        tool_schemas: &[Value],
    ) -> Result<LLMResponse, ProviderError> {
        let provider = self.resolve_provider(agent)?.clone();
        let adapter = self.get_backend(provider.kind).await;
        adapter.call(ctx, tool_schemas, agent, &provider).await
    }

    /// Returns the cached adapter plus a owned copy of its provider, so the
    /// caller can hold both locally for the lifetime of a streaming call —
    /// `ProviderAdapter::stream`'s return value borrows its `&self`/`&Provider`
    /// arguments, which cannot outlive a reference borrowed from `Router`
    /// itself inside this async method.
    pub async fn resolve_adapter(&self, agent: &Agent) -> Result<(Arc<dyn ProviderAdapter>, Provider), ProviderError> {
        let provider = self.resolve_provider(agent)?.clone();
        let adapter = self.get_backend(provider.kind).await;
        Ok((adapter, provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloudllm::provider::ProviderKind;

    fn sample_router() -> Router {
        let agents = vec![
            Agent::new("researcher", "Find things out.", "gpt-5", "openai"),
            Agent::new("writer", "Write things up.", "gpt-5", "openai"),
        ];
        let providers = vec![Provider::new("openai", ProviderKind::OpenAi, "sk-test")];
        Router::new(agents, Vec::new(), providers)
    }

    #[test]
    fn tool_schemas_end_with_sentinels_in_order() {
        let router = sample_router();
        let agent = router.get_agent("researcher").unwrap().clone();
        let schemas = router.build_tool_schemas(&agent);
        assert_eq!(schemas[schemas.len() - 2]["name"], "call_agent");
        assert_eq!(schemas[schemas.len() - 1]["name"], "finish");
    }

    #[test]
    fn system_prompt_lists_other_agents() {
        let router = sample_router();
        let agent = router.get_agent("researcher").unwrap().clone();
        let prompt = router.build_system_prompt(&agent);
        assert!(prompt.contains("writer"));
        assert!(!prompt.contains("- researcher"));
        assert!(prompt.contains("call_agent"));
    }

    #[test]
    fn unknown_agent_is_a_routing_error() {
        let router = sample_router();
        assert!(router.get_agent("nobody").is_err());
    }

    #[test]
    fn duplicate_agent_name_keeps_last_write() {
        let agents = vec![
            Agent::new("dup", "first", "m1", "openai"),
            Agent::new("dup", "second", "m2", "openai"),
        ];
        let router = Router::new(agents, Vec::new(), Vec::new());
        assert_eq!(router.get_agent("dup").unwrap().instructions, "second");
    }
}
