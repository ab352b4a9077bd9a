//! Error taxonomy for the agent runtime.
//!
//! Every failure the runtime can surface to a caller is one of the four
//! variants below. Tool-callable failures reached through the parallel
//! dispatch path in [`crate::cloudllm::runtime`] are the one exception:
//! those are caught and converted into a `"Error: <message>"` tool result
//! string rather than propagated, so a single misbehaving tool never aborts
//! an agent turn.

use std::fmt;

/// An LLM adapter failure: vendor errors, empty responses, auth/model errors.
///
/// Fatal to the current agent turn — propagates out of [`crate::cloudllm::runtime::Runtime::execute`].
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub provider_name: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(provider_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.provider_name, self.message)
    }
}

impl std::error::Error for ProviderError {}

/// A tool-not-found lookup failure, or a wrapped exception from a tool's
/// callable when reached through an unwrapped path (outside the parallel
/// dispatch loop, which swallows callable errors into a string result).
#[derive(Debug, Clone)]
pub struct ToolError {
    pub tool_name: String,
    pub message: String,
}

impl ToolError {
    pub fn new(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.tool_name, self.message)
    }
}

impl std::error::Error for ToolError {}

/// An unknown target agent named in a `call_agent` sentinel.
///
/// Fatal to the current turn — propagates.
#[derive(Debug, Clone)]
pub struct RoutingError {
    pub message: String,
}

impl RoutingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for RoutingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RoutingError {}

/// Reserved for higher-level orchestration failures. Not raised by the core
/// loop itself, but part of the taxonomy callers may want to match on.
#[derive(Debug, Clone)]
pub struct AgentError {
    pub agent_name: String,
    pub message: String,
}

impl AgentError {
    pub fn new(agent_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.agent_name, self.message)
    }
}

impl std::error::Error for AgentError {}

/// Union of every error kind the runtime's public entrypoints can raise.
#[derive(Debug, Clone)]
pub enum CoreError {
    Provider(ProviderError),
    Tool(ToolError),
    Routing(RoutingError),
    Agent(AgentError),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Provider(e) => write!(f, "{}", e),
            CoreError::Tool(e) => write!(f, "{}", e),
            CoreError::Routing(e) => write!(f, "{}", e),
            CoreError::Agent(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<ProviderError> for CoreError {
    fn from(e: ProviderError) -> Self {
        CoreError::Provider(e)
    }
}

impl From<ToolError> for CoreError {
    fn from(e: ToolError) -> Self {
        CoreError::Tool(e)
    }
}

impl From<RoutingError> for CoreError {
    fn from(e: RoutingError) -> Self {
        CoreError::Routing(e)
    }
}

impl From<AgentError> for CoreError {
    fn from(e: AgentError) -> Self {
        CoreError::Agent(e)
    }
}
