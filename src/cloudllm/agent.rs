//! Agent configuration — the surface dataclass a [`crate::cloudllm::Router`]
//! and [`crate::cloudllm::Runtime`] drive, not a stateful session object.

use std::collections::HashMap;

/// A named role bound to a model and a provider.
///
/// `name` must be unique within a `Router`. Everything else is plain
/// configuration read by the adapters when building a vendor request.
#[derive(Debug, Clone)]
pub struct Agent {
    pub name: String,
    pub instructions: String,
    pub model: String,
    pub provider: String,
    pub max_output_tokens: Option<u32>,
    pub reasoning: bool,
    pub reasoning_effort: String,
    pub reasoning_budget: Option<u32>,
    pub temperature: f32,
    pub extra: HashMap<String, serde_json::Value>,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        model: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            model: model.into(),
            provider: provider.into(),
            max_output_tokens: None,
            reasoning: false,
            reasoning_effort: "medium".to_string(),
            reasoning_budget: None,
            temperature: 1.0,
            extra: HashMap::new(),
        }
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    pub fn with_reasoning(mut self, effort: impl Into<String>) -> Self {
        self.reasoning = true;
        self.reasoning_effort = effort.into();
        self
    }

    pub fn with_reasoning_budget(mut self, budget: u32) -> Self {
        self.reasoning_budget = Some(budget);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let agent = Agent::new("researcher", "Find things out.", "gpt-5", "openai");
        assert_eq!(agent.temperature, 1.0);
        assert!(!agent.reasoning);
        assert!(agent.max_output_tokens.is_none());
    }

    #[test]
    fn reasoning_sets_effort() {
        let agent = Agent::new("a", "i", "m", "p").with_reasoning("high");
        assert!(agent.reasoning);
        assert_eq!(agent.reasoning_effort, "high");
    }
}
