// src/lib.rs

//! A multi-agent orchestration runtime.
//!
//! An [`Agent`] is a named role (instructions, model, provider, sampling
//! parameters). A [`Router`] holds the registered agents, tools, and
//! providers and knows how to turn an agent into a tool schema list, a
//! system prompt, and an LLM call. A [`Runtime`] drives one agent's turn
//! loop to completion: call the LLM, dispatch any tool calls it asked for
//! (including recursive sub-agent delegation via the `call_agent` sentinel
//! tool), and repeat until the agent calls `finish` or stops asking for
//! tools.
//!
//! See [`run`] / [`async_run`] for the simplest entrypoints, and
//! [`async_run_stream`] for the token-streaming variant.

pub mod cloudllm;

pub use cloudllm::{
    async_run, async_run_stream, run, Agent, AgentError, AgentEvent, Attachment, Context,
    ContextMessage, CoreError, EventLog, EventType, LLMResponse, Message, Provider, ProviderAdapter,
    ProviderError, ProviderKind, RoutingError, Router, RunResult, Runtime, Span, StreamChunk,
    StreamEvent, StreamEventType, Tool, ToolCall, ToolError, ToolParameter, ToolParameterType,
    ToolResult, Trace,
};
