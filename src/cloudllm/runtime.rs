//! The agent turn loop: calls the LLM, dispatches any tool calls it asked
//! for (including recursive `call_agent` delegation), and repeats until the
//! agent produces plain text or invokes `finish`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::future::join_all;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::cloudllm::adapters::StreamChunk;
use crate::cloudllm::agent::Agent;
use crate::cloudllm::context::{Context, ToolCall};
use crate::cloudllm::error::CoreError;
use crate::cloudllm::event::{EventLog, EventType};
use crate::cloudllm::message::Message;
use crate::cloudllm::provider::Provider;
use crate::cloudllm::router::Router;
use crate::cloudllm::tool::{Tool, ToolResult};
use crate::cloudllm::trace::Trace;

const CALL_AGENT: &str = "call_agent";
const FINISH: &str = "finish";
const PREVIEW_LEN: usize = 200;

/// What a batch run produced: the terminal text, the full forward/return
/// message log, and — only when the run was started with `debug=true` —
/// the underlying event log and its reconstructed span tree.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub output: String,
    pub messages: Vec<Message>,
    pub trace: Option<Trace>,
    pub event_log: Option<EventLog>,
}

impl RunResult {
    /// The trace rendered as an ASCII tree, or a note that none was
    /// captured — convenient for logging a finished run without matching
    /// on `Option` at every call site.
    pub fn format_trace(&self) -> String {
        match &self.trace {
            Some(trace) => trace.print_tree(),
            None => "(no trace — run with debug=true)".to_string(),
        }
    }
}

/// The kind of lifecycle moment a [`StreamEvent`] reports during
/// [`Runtime::execute_stream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEventType {
    Token,
    ToolCall,
    AgentCall,
    AgentReturn,
    Finish,
    Error,
}

/// One event of a streaming run. Exactly one `Finish` or `Error` event ends
/// the stream, and nothing follows it.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    pub event_type: StreamEventType,
    pub agent_name: String,
    pub data: Map<String, Value>,
}

impl StreamEvent {
    fn new(event_type: StreamEventType, agent_name: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            event_type,
            agent_name: agent_name.into(),
            data,
        }
    }
}

fn truncate(text: &str) -> String {
    Message::preview(text, PREVIEW_LEN)
}

fn find_finish(tool_calls: &[ToolCall]) -> Option<&ToolCall> {
    tool_calls.iter().find(|tc| tc.name == FINISH)
}

fn finish_message(tc: &ToolCall) -> String {
    tc.arguments
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Shared, task-safe state threaded through a (possibly recursive) run:
/// the process-visible message log and the optional event log. Owned by
/// one `Runtime::execute`/`execute_stream` call, never a process-global.
struct RunState {
    messages: Mutex<Vec<Message>>,
    event_log: Mutex<Option<EventLog>>,
}

impl RunState {
    fn new(debug: bool) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            event_log: Mutex::new(if debug { Some(EventLog::new()) } else { None }),
        }
    }

    async fn push_message(&self, message: Message) {
        self.messages.lock().await.push(message);
    }

    async fn record(
        &self,
        event_type: EventType,
        agent_name: &str,
        call_id: impl Into<String>,
        parent_call_id: Option<String>,
        details: Map<String, Value>,
    ) {
        if let Some(log) = self.event_log.lock().await.as_mut() {
            log.record(event_type, agent_name, call_id, parent_call_id, details);
        }
    }
}

/// Drives one agent's turn loop to completion, recursing into fresh
/// `Context`s for sub-agent delegation. Stateless beyond the `Router` it
/// wraps — a single `Runtime` can drive any number of concurrent runs.
pub struct Runtime {
    router: Arc<Router>,
}

impl Runtime {
    pub fn new(router: Arc<Router>) -> Self {
        Self { router }
    }

    /// Drive `agent_name` to completion against `message`, fanning out any
    /// parallel tool calls and recursing for `call_agent` delegation.
    pub async fn execute(&self, agent_name: &str, message: impl Into<String>, debug: bool) -> Result<RunResult, CoreError> {
        let state = RunState::new(debug);
        let output = self
            .run_turn(agent_name, message.into(), "user".to_string(), None, &state)
            .await?;

        let messages = state.messages.into_inner();
        let event_log = state.event_log.into_inner();
        let trace = event_log.as_ref().map(Trace::from_event_log);

        Ok(RunResult {
            output,
            messages,
            trace,
            event_log,
        })
    }

    /// The turn-by-turn state machine for one agent call, §4.6/§4.9. Boxed
    /// because `call_agent` delegation recurses into this same method with
    /// a fresh `Context` — Rust can't otherwise give a recursive async fn a
    /// finite-sized future.
    fn run_turn<'a>(
        &'a self,
        agent_name: &'a str,
        forward_message: String,
        caller: String,
        parent_call_id: Option<String>,
        state: &'a RunState,
    ) -> Pin<Box<dyn Future<Output = Result<String, CoreError>> + Send + 'a>> {
        Box::pin(async move {
            let call_id = Uuid::new_v4().to_string();

            state
                .push_message(Message::forward_with_call_id(
                    caller,
                    agent_name.to_string(),
                    forward_message.clone(),
                    call_id.clone(),
                ))
                .await;

            let mut call_details = Map::new();
            call_details.insert("message".to_string(), Value::String(truncate(&forward_message)));
            state
                .record(EventType::AgentCall, agent_name, call_id.clone(), parent_call_id.clone(), call_details)
                .await;

            let agent = self.router.get_agent(agent_name)?.clone();
            let system_prompt = self.router.build_system_prompt(&agent);
            let tool_schemas = self.router.build_tool_schemas(&agent);

            let mut ctx = Context::with_system(system_prompt);
            ctx.add_user(forward_message);

            let output = loop {
                let mut llm_call_details = Map::new();
                llm_call_details.insert("model".to_string(), Value::String(agent.model.clone()));
                state
                    .record(EventType::LlmCall, agent_name, call_id.clone(), parent_call_id.clone(), llm_call_details)
                    .await;

                log::debug!("cloudllm::runtime: [{}] calling model '{}'", agent_name, agent.model);
                let response = self.router.call_llm(&agent, &ctx, &tool_schemas).await?;

                let mut response_details = Map::new();
                response_details.insert(
                    "has_tool_calls".to_string(),
                    Value::Bool(!response.tool_calls.is_empty()),
                );
                response_details.insert(
                    "content_length".to_string(),
                    Value::from(response.content.as_deref().map_or(0, str::len)),
                );
                state
                    .record(
                        EventType::LlmResponse,
                        agent_name,
                        call_id.clone(),
                        parent_call_id.clone(),
                        response_details,
                    )
                    .await;

                if response.tool_calls.is_empty() {
                    break response.content.unwrap_or_default();
                }

                if let Some(finish_call) = find_finish(&response.tool_calls) {
                    let result = finish_message(finish_call);
                    let mut details = Map::new();
                    details.insert("output".to_string(), Value::String(truncate(&result)));
                    state
                        .record(EventType::Finish, agent_name, call_id.clone(), parent_call_id.clone(), details)
                        .await;
                    break result;
                }

                ctx.add_assistant_tool_calls(response.content.clone(), response.tool_calls.clone());

                let futures = response
                    .tool_calls
                    .iter()
                    .map(|tc| self.dispatch_tool_call(tc.clone(), agent_name, call_id.clone(), state));
                let results = join_all(futures).await;

                for (tc, result) in response.tool_calls.iter().zip(results) {
                    let tool_result = result?;
                    ctx.add_tool_result_with_attachments(
                        tc.id.clone(),
                        tc.name.clone(),
                        tool_result.output,
                        tool_result.attachments,
                    );
                }
            };

            state
                .push_message(Message::return_with_call_id(
                    agent_name.to_string(),
                    "user".to_string(),
                    output.clone(),
                    call_id.clone(),
                ))
                .await;
            let mut return_details = Map::new();
            return_details.insert("output".to_string(), Value::String(truncate(&output)));
            state
                .record(EventType::AgentReturn, agent_name, call_id, parent_call_id, return_details)
                .await;

            Ok(output)
        })
    }

    /// Resolve and run one tool call. `call_agent` recurses into
    /// [`Runtime::run_turn`] with a fresh `Context`; an unresolved target
    /// agent is a fatal `RoutingError` that propagates out of this whole
    /// dispatch round. Every other failure — an unknown tool name, or the
    /// tool's own callable raising — is swallowed into an `"Error: ..."`
    /// string result so one bad call never aborts the turn.
    fn dispatch_tool_call<'a>(
        &'a self,
        tc: ToolCall,
        caller_name: &'a str,
        caller_call_id: String,
        state: &'a RunState,
    ) -> Pin<Box<dyn Future<Output = Result<ToolResult, CoreError>> + Send + 'a>> {
        Box::pin(async move {
            if tc.name == CALL_AGENT {
                let target_name = tc
                    .arguments
                    .get("agent_name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let message = tc
                    .arguments
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();

                // Fail fast on an unknown target before minting a sub-call_id
                // or recording anything for it.
                self.router.get_agent(&target_name)?;

                log::debug!(
                    "cloudllm::runtime: [{}] delegating to '{}' via call_agent",
                    caller_name,
                    target_name
                );
                let result = self
                    .run_turn(&target_name, message, caller_name.to_string(), Some(caller_call_id), state)
                    .await?;
                return Ok(ToolResult::success(result));
            }

            let mut details = Map::new();
            details.insert("tool_name".to_string(), Value::String(tc.name.clone()));
            details.insert("arguments".to_string(), Value::Object(tc.arguments.clone()));
            state
                .record(EventType::ToolExec, caller_name, caller_call_id, None, details)
                .await;

            match self.router.get_tool(&tc.name) {
                Ok(tool) => Ok(Self::run_tool(tool.as_ref(), tc.arguments.clone()).await),
                Err(e) => {
                    log::warn!("cloudllm::runtime: {}", e);
                    Ok(ToolResult::success(format!("Error: {}", e)))
                }
            }
        })
    }

    async fn run_tool(tool: &dyn Tool, args: Map<String, Value>) -> ToolResult {
        match tool.execute_rich(args).await {
            Ok(result) => result,
            Err(e) => {
                log::warn!("cloudllm::runtime: tool '{}' failed: {}", tool.name(), e);
                ToolResult::success(format!("Error: {}", e))
            }
        }
    }

    /// The streaming counterpart of [`Runtime::execute`]. Tool calls within
    /// one turn run serially here rather than fanning out — a deliberate,
    /// documented asymmetry (§4.8/§9) so the emitted `tool_call` events stay
    /// in one observable order without buffering the whole turn.
    pub fn execute_stream<'a>(
        &'a self,
        agent_name: &'a str,
        message: impl Into<String> + Send + 'a,
    ) -> BoxStream<'a, StreamEvent> {
        let forward_message = message.into();
        let stream = async_stream::stream! {
            let state = RunState::new(false);
            let call_id = Uuid::new_v4().to_string();

            state.push_message(Message::forward_with_call_id(
                "user".to_string(),
                agent_name.to_string(),
                forward_message.clone(),
                call_id.clone(),
            )).await;

            let mut output = String::new();
            let mut saw_terminal = false;
            let mut inner = self.stream_turn(agent_name, forward_message, call_id.clone(), None, &state);
            while let Some(event) = inner.next().await {
                if event.event_type == StreamEventType::Finish {
                    if let Some(Value::String(text)) = event.data.get("output") {
                        output = text.clone();
                    }
                    saw_terminal = true;
                } else if event.event_type == StreamEventType::Error {
                    saw_terminal = true;
                }
                yield event;
                if saw_terminal {
                    return;
                }
            }

            state.push_message(Message::return_with_call_id(
                agent_name.to_string(),
                "user".to_string(),
                output,
                call_id,
            )).await;
        };
        stream.boxed()
    }

    /// The per-turn half of the streaming path (§4.8), mirroring
    /// [`Runtime::run_turn`] but executing tool calls serially and emitting
    /// a `StreamEvent` for every structural step instead of returning once.
    fn stream_turn<'a>(
        &'a self,
        agent_name: &'a str,
        forward_message: String,
        call_id: String,
        parent_call_id: Option<String>,
        state: &'a RunState,
    ) -> BoxStream<'a, StreamEvent> {
        let stream = async_stream::stream! {
            let agent = match self.router.get_agent(agent_name) {
                Ok(agent) => agent.clone(),
                Err(e) => {
                    yield StreamEvent::new(StreamEventType::Error, agent_name, error_details(&e.to_string()));
                    return;
                }
            };
            let system_prompt = self.router.build_system_prompt(&agent);
            let tool_schemas = self.router.build_tool_schemas(&agent);

            let mut ctx = Context::with_system(system_prompt);
            ctx.add_user(forward_message);

            loop {
                let (adapter, provider) = match self.router.resolve_adapter(&agent).await {
                    Ok(pair) => pair,
                    Err(e) => {
                        yield StreamEvent::new(StreamEventType::Error, agent_name, error_details(&e.to_string()));
                        return;
                    }
                };
                let mut chunks = match adapter.stream(&ctx, &tool_schemas, &agent, &provider).await {
                    Ok(chunks) => chunks,
                    Err(e) => {
                        yield StreamEvent::new(StreamEventType::Error, agent_name, error_details(&e.to_string()));
                        return;
                    }
                };

                let mut response = None;
                while let Some(chunk) = chunks.next().await {
                    match chunk {
                        StreamChunk::Token(text) => {
                            let mut data = Map::new();
                            data.insert("text".to_string(), Value::String(text));
                            yield StreamEvent::new(StreamEventType::Token, agent_name, data);
                        }
                        StreamChunk::Final(final_response) => {
                            response = Some(final_response);
                        }
                    }
                }

                let response = match response {
                    Some(response) => response,
                    None => {
                        yield StreamEvent::new(StreamEventType::Error, agent_name, error_details("No response from LLM"));
                        return;
                    }
                };

                if response.tool_calls.is_empty() {
                    let mut data = Map::new();
                    data.insert("output".to_string(), Value::String(response.content.unwrap_or_default()));
                    yield StreamEvent::new(StreamEventType::Finish, agent_name, data);
                    return;
                }

                if let Some(finish_call) = find_finish(&response.tool_calls) {
                    let mut data = Map::new();
                    data.insert("output".to_string(), Value::String(finish_message(finish_call)));
                    yield StreamEvent::new(StreamEventType::Finish, agent_name, data);
                    return;
                }

                ctx.add_assistant_tool_calls(response.content.clone(), response.tool_calls.clone());

                for tc in &response.tool_calls {
                    if tc.name == CALL_AGENT {
                        let target_name = tc
                            .arguments
                            .get("agent_name")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        let sub_message = tc
                            .arguments
                            .get("message")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();

                        if self.router.get_agent(&target_name).is_err() {
                            yield StreamEvent::new(
                                StreamEventType::Error,
                                agent_name,
                                error_details(&format!("no agent registered with name '{}'", target_name)),
                            );
                            return;
                        }

                        let sub_call_id = Uuid::new_v4().to_string();
                        state.push_message(Message::forward_with_call_id(
                            agent_name.to_string(),
                            target_name.clone(),
                            sub_message.clone(),
                            sub_call_id.clone(),
                        )).await;

                        let mut call_data = Map::new();
                        call_data.insert("from".to_string(), Value::String(agent_name.to_string()));
                        call_data.insert("message".to_string(), Value::String(truncate(&sub_message)));
                        yield StreamEvent::new(StreamEventType::AgentCall, target_name.clone(), call_data);

                        let mut sub_result = String::new();
                        let mut sub_stream = self.stream_turn(
                            &target_name,
                            sub_message,
                            sub_call_id.clone(),
                            Some(call_id.clone()),
                            state,
                        );
                        while let Some(sub_event) = sub_stream.next().await {
                            if sub_event.event_type == StreamEventType::Finish {
                                if let Some(Value::String(text)) = sub_event.data.get("output") {
                                    sub_result = text.clone();
                                }
                            }
                            yield sub_event;
                        }

                        state.push_message(Message::return_with_call_id(
                            target_name.clone(),
                            agent_name.to_string(),
                            sub_result.clone(),
                            sub_call_id,
                        )).await;

                        let mut return_data = Map::new();
                        return_data.insert("result".to_string(), Value::String(truncate(&sub_result)));
                        yield StreamEvent::new(StreamEventType::AgentReturn, target_name, return_data);

                        ctx.add_tool_result(tc.id.clone(), tc.name.clone(), sub_result);
                    } else {
                        let mut call_data = Map::new();
                        call_data.insert("tool_name".to_string(), Value::String(tc.name.clone()));
                        call_data.insert("arguments".to_string(), Value::Object(tc.arguments.clone()));
                        yield StreamEvent::new(StreamEventType::ToolCall, agent_name, call_data);

                        let result = match self.router.get_tool(&tc.name) {
                            Ok(tool) => Self::run_tool(tool.as_ref(), tc.arguments.clone()).await,
                            Err(e) => ToolResult::success(format!("Error: {}", e)),
                        };
                        ctx.add_tool_result_with_attachments(
                            tc.id.clone(),
                            tc.name.clone(),
                            result.output,
                            result.attachments,
                        );
                    }
                }
            }
        };
        stream.boxed()
    }
}

fn error_details(message: &str) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("error".to_string(), Value::String(message.to_string()));
    data
}

/// Build a one-shot `Router` from the given agents/tools/providers and drive
/// `entry` to completion against `message`.
pub async fn async_run(
    entry: &str,
    message: impl Into<String>,
    agents: Vec<Agent>,
    tools: Vec<Arc<dyn Tool>>,
    providers: Vec<Provider>,
    debug: bool,
) -> Result<RunResult, CoreError> {
    let router = Arc::new(Router::new(agents, tools, providers));
    Runtime::new(router).execute(entry, message, debug).await
}

/// Blocking façade over [`async_run`] for callers outside a Tokio runtime —
/// spins up a current-thread runtime for the duration of the call.
pub fn run(
    entry: &str,
    message: impl Into<String>,
    agents: Vec<Agent>,
    tools: Vec<Arc<dyn Tool>>,
    providers: Vec<Provider>,
    debug: bool,
) -> Result<RunResult, CoreError> {
    let message = message.into();
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to start a current-thread Tokio runtime");
    rt.block_on(async_run(entry, message, agents, tools, providers, debug))
}

/// The streaming counterpart of [`async_run`]/[`run`]. Builds a one-shot
/// `Router` and drives `entry`'s turn loop, yielding a [`StreamEvent`] for
/// every structural step and every text delta the adapter produces.
pub fn async_run_stream(
    entry: String,
    message: impl Into<String> + Send + 'static,
    agents: Vec<Agent>,
    tools: Vec<Arc<dyn Tool>>,
    providers: Vec<Provider>,
) -> BoxStream<'static, StreamEvent> {
    let message = message.into();
    let stream = async_stream::stream! {
        let router = Arc::new(Router::new(agents, tools, providers));
        let runtime = Runtime::new(router);
        let mut inner = runtime.execute_stream(&entry, message);
        while let Some(event) = inner.next().await {
            yield event;
        }
    };
    stream.boxed()
}
