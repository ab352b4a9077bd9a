// src/cloudllm/mod.rs

pub mod adapters;
pub mod agent;
pub mod context;
pub mod error;
pub mod event;
pub mod llm_response;
pub mod message;
pub mod provider;
pub mod router;
pub mod runtime;
pub mod tool;
pub mod trace;

// Flatten the common surface so callers write `cloudllm::Agent` instead of
// `cloudllm::agent::Agent`.
pub use adapters::{ProviderAdapter, StreamChunk};
pub use agent::Agent;
pub use context::{Attachment, Context, ContextMessage, ToolCall};
pub use error::{AgentError, CoreError, ProviderError, RoutingError, ToolError};
pub use event::{AgentEvent, EventLog, EventType};
pub use llm_response::LLMResponse;
pub use message::Message;
pub use provider::{Provider, ProviderKind};
pub use router::Router;
pub use runtime::{async_run, async_run_stream, run, Runtime, RunResult, StreamEvent, StreamEventType};
pub use tool::{Tool, ToolParameter, ToolParameterType, ToolResult};
pub use trace::{Span, Trace};
