//! Anthropic messages-API normalization (`/v1/messages`), including the
//! per-model `max_tokens` auto-discovery the other two vendors don't need.

use std::collections::HashMap;
use std::sync::OnceLock;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::stream::{BoxStream, StreamExt};
use regex::Regex;
use reqwest::Response;
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;

use crate::cloudllm::adapters::http::shared_http_client;
use crate::cloudllm::adapters::{require_nonempty, ProviderAdapter, StreamChunk};
use crate::cloudllm::agent::Agent;
use crate::cloudllm::context::{Attachment, Context, ContextMessage, ToolCall};
use crate::cloudllm::error::ProviderError;
use crate::cloudllm::llm_response::LLMResponse;
use crate::cloudllm::provider::Provider;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROBE_MAX_TOKENS: u32 = 999_999_999;
const DEFAULT_MAX_TOKENS: u32 = 8192;

fn max_tokens_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"> (\d+),").expect("valid regex"))
}

fn max_tokens_fallback_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bis\s+(\d+)").expect("valid regex"))
}

fn extract_max_tokens(message: &str) -> Option<u32> {
    max_tokens_re()
        .captures(message)
        .or_else(|| max_tokens_fallback_re().captures(message))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Caches the model-reported `max_tokens` ceiling, keyed by model name.
/// Scoped to one adapter instance rather than a process-global, so two
/// `AnthropicAdapter`s never share cached state across unrelated runs.
pub struct AnthropicAdapter {
    max_tokens_cache: Mutex<HashMap<String, u32>>,
}

impl AnthropicAdapter {
    pub fn new() -> Self {
        Self {
            max_tokens_cache: Mutex::new(HashMap::new()),
        }
    }

    fn attachment_block(attachment: &Attachment) -> Value {
        let source = if let Some(data) = &attachment.data {
            json!({"type": "base64", "media_type": attachment.mime_type, "data": data})
        } else {
            json!({"type": "url", "url": attachment.url.clone().unwrap_or_default()})
        };
        if attachment.mime_type.starts_with("image/") {
            json!({"type": "image", "source": source})
        } else {
            json!({"type": "document", "source": source})
        }
    }

    /// `system` is returned separately from `messages`; tool results batch
    /// consecutive `Tool` messages into one user message of `tool_result`
    /// blocks, matching the vendor's expectation that every tool result
    /// answering one assistant turn arrives together.
    fn build_messages(ctx: &Context) -> (Option<String>, Vec<Value>) {
        let mut system = None;
        let mut messages = Vec::new();
        let mut pending_tool_results: Vec<Value> = Vec::new();

        let flush = |pending: &mut Vec<Value>, messages: &mut Vec<Value>| {
            if !pending.is_empty() {
                messages.push(json!({"role": "user", "content": std::mem::take(pending)}));
            }
        };

        for msg in ctx.messages() {
            match msg {
                ContextMessage::System { content } => {
                    system = Some(content.clone());
                }
                ContextMessage::User { content, attachments } => {
                    flush(&mut pending_tool_results, &mut messages);
                    if attachments.is_empty() {
                        messages.push(json!({"role": "user", "content": content}));
                    } else {
                        let mut blocks = vec![json!({"type": "text", "text": content})];
                        blocks.extend(attachments.iter().map(Self::attachment_block));
                        messages.push(json!({"role": "user", "content": blocks}));
                    }
                }
                ContextMessage::Assistant { content, tool_calls } => {
                    flush(&mut pending_tool_results, &mut messages);
                    let mut blocks = Vec::new();
                    if let Some(text) = content {
                        if !text.is_empty() {
                            blocks.push(json!({"type": "text", "text": text}));
                        }
                    }
                    for tc in tool_calls {
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": tc.id,
                            "name": tc.name,
                            "input": Value::Object(tc.arguments.clone()),
                        }));
                    }
                    messages.push(json!({"role": "assistant", "content": blocks}));
                }
                ContextMessage::Tool {
                    tool_call_id,
                    content,
                    attachments,
                    ..
                } => {
                    let block = if attachments.is_empty() {
                        json!({"type": "tool_result", "tool_use_id": tool_call_id, "content": content})
                    } else {
                        let mut blocks = vec![json!({"type": "text", "text": content})];
                        blocks.extend(attachments.iter().map(Self::attachment_block));
                        json!({"type": "tool_result", "tool_use_id": tool_call_id, "content": blocks})
                    };
                    pending_tool_results.push(block);
                }
            }
        }
        flush(&mut pending_tool_results, &mut messages);
        (system, messages)
    }

    fn build_tools(tool_schemas: &[Value]) -> Vec<Value> {
        tool_schemas
            .iter()
            .map(|schema| {
                json!({
                    "name": schema.get("name"),
                    "description": schema.get("description"),
                    "input_schema": schema.get("parameters"),
                })
            })
            .collect()
    }

    fn build_body(
        ctx: &Context,
        tool_schemas: &[Value],
        agent: &Agent,
        max_tokens: u32,
        stream: bool,
    ) -> Value {
        let (system, messages) = Self::build_messages(ctx);
        let mut body = Map::new();
        body.insert("model".to_string(), Value::String(agent.model.clone()));
        body.insert("max_tokens".to_string(), Value::from(max_tokens));
        body.insert("messages".to_string(), Value::Array(messages));
        body.insert("stream".to_string(), Value::Bool(stream));
        if let Some(system) = system {
            body.insert("system".to_string(), Value::String(system));
        }
        if !tool_schemas.is_empty() {
            body.insert("tools".to_string(), Value::Array(Self::build_tools(tool_schemas)));
        }
        if agent.reasoning {
            body.insert(
                "thinking".to_string(),
                json!({"type": "enabled", "budget_tokens": agent.reasoning_budget.unwrap_or(4096)}),
            );
            body.insert("temperature".to_string(), Value::from(1.0));
        } else {
            body.insert("temperature".to_string(), Value::from(agent.temperature));
        }
        for (key, value) in &agent.extra {
            body.insert(key.clone(), value.clone());
        }
        Value::Object(body)
    }

    async fn post(
        &self,
        ctx: &Context,
        tool_schemas: &[Value],
        agent: &Agent,
        provider: &Provider,
        max_tokens: u32,
        stream: bool,
    ) -> Result<Response, ProviderError> {
        let base_url = provider.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let body = Self::build_body(ctx, tool_schemas, agent, max_tokens, stream);
        shared_http_client()
            .post(format!("{}/messages", base_url))
            .header("x-api-key", &provider.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::new("anthropic", e.to_string()))
    }

    /// Resolve the `max_tokens` to send: the agent's declared value if set,
    /// else a cached per-model value, else a probe-and-discover round trip
    /// (see §4.5): send an absurdly large value, parse the model's real
    /// ceiling out of the resulting error message, cache it, and use it.
    async fn resolve_max_tokens(
        &self,
        ctx: &Context,
        tool_schemas: &[Value],
        agent: &Agent,
        provider: &Provider,
    ) -> Result<u32, ProviderError> {
        if let Some(max_tokens) = agent.max_output_tokens {
            return Ok(max_tokens);
        }
        if let Some(cached) = self.max_tokens_cache.lock().await.get(&agent.model).copied() {
            return Ok(cached);
        }

        let probe = self
            .post(ctx, tool_schemas, agent, provider, PROBE_MAX_TOKENS, false)
            .await?;
        if probe.status().is_success() {
            // The vendor accepted an absurd ceiling; fall back to a sane
            // default rather than caching the probe value itself.
            self.max_tokens_cache
                .lock()
                .await
                .insert(agent.model.clone(), DEFAULT_MAX_TOKENS);
            return Ok(DEFAULT_MAX_TOKENS);
        }

        let status = probe.status();
        let text = probe.text().await.unwrap_or_default();
        if let Some(discovered) = extract_max_tokens(&text) {
            self.max_tokens_cache
                .lock()
                .await
                .insert(agent.model.clone(), discovered);
            return Ok(discovered);
        }
        if text.to_lowercase().contains("max_tokens") {
            log::warn!(
                "cloudllm::adapters::anthropic: could not parse max_tokens ceiling for model '{}' from error text, falling back to {}",
                agent.model,
                DEFAULT_MAX_TOKENS
            );
            self.max_tokens_cache
                .lock()
                .await
                .insert(agent.model.clone(), DEFAULT_MAX_TOKENS);
            return Ok(DEFAULT_MAX_TOKENS);
        }
        Err(ProviderError::new("anthropic", format!("HTTP {}: {}", status, text)))
    }
}

impl Default for AnthropicAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    async fn call(
        &self,
        ctx: &Context,
        tool_schemas: &[Value],
        agent: &Agent,
        provider: &Provider,
    ) -> Result<LLMResponse, ProviderError> {
        // The reference adapter implements `call` as "drain `stream`, keep
        // the last element" — true here too, since `stream` already does
        // the SSE request/parse/accumulate work this needs.
        let mut chunks = self.stream(ctx, tool_schemas, agent, provider).await?;
        let mut last_response = None;
        while let Some(chunk) = chunks.next().await {
            if let StreamChunk::Final(response) = chunk {
                last_response = Some(response);
            }
        }
        let response = last_response
            .ok_or_else(|| ProviderError::new("anthropic", "stream ended without a final response"))?;
        require_nonempty("anthropic", response)
    }

    async fn stream<'a>(
        &'a self,
        ctx: &'a Context,
        tool_schemas: &'a [Value],
        agent: &'a Agent,
        provider: &'a Provider,
    ) -> Result<BoxStream<'a, StreamChunk>, ProviderError> {
        let max_tokens = self.resolve_max_tokens(ctx, tool_schemas, agent, provider).await?;
        let response = self.post(ctx, tool_schemas, agent, provider, max_tokens, true).await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::new("anthropic", format!("HTTP {}: {}", status, text)));
        }

        let event_stream = response.bytes_stream().eventsource();

        let stream = async_stream::stream! {
            futures_util::pin_mut!(event_stream);

            let mut full_content = String::new();
            // index -> (id, name, accumulated partial JSON)
            let mut tool_blocks: HashMap<u64, (String, String, String)> = HashMap::new();
            let mut finished_tool_calls: Vec<ToolCall> = Vec::new();
            let mut block_index: u64 = 0;

            while let Some(event_result) = event_stream.next().await {
                let event = match event_result {
                    Ok(event) => event,
                    Err(err) => {
                        log::error!("cloudllm::adapters::anthropic: SSE stream error: {}", err);
                        break;
                    }
                };
                if event.data.trim().is_empty() {
                    continue;
                }
                let data: Value = match serde_json::from_str(&event.data) {
                    Ok(data) => data,
                    Err(_) => continue,
                };

                match event.event.as_str() {
                    "content_block_start" => {
                        if let Some(block) = data.get("content_block") {
                            if block.get("type").and_then(Value::as_str) == Some("tool_use") {
                                let id = block.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
                                let name = block.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
                                let idx = data.get("index").and_then(Value::as_u64).unwrap_or(block_index);
                                tool_blocks.insert(idx, (id, name, String::new()));
                            }
                        }
                    }
                    "content_block_delta" => {
                        if let Some(delta) = data.get("delta") {
                            match delta.get("type").and_then(Value::as_str) {
                                Some("text_delta") => {
                                    if let Some(text) = delta.get("text").and_then(Value::as_str) {
                                        full_content.push_str(text);
                                        yield StreamChunk::Token(text.to_string());
                                    }
                                }
                                Some("input_json_delta") => {
                                    let idx = data.get("index").and_then(Value::as_u64).unwrap_or(block_index);
                                    if let Some(partial) = delta.get("partial_json").and_then(Value::as_str) {
                                        if let Some(entry) = tool_blocks.get_mut(&idx) {
                                            entry.2.push_str(partial);
                                        }
                                    }
                                }
                                _ => {}
                            }
                        }
                    }
                    "content_block_stop" => {
                        let idx = data.get("index").and_then(Value::as_u64).unwrap_or(block_index);
                        if let Some((id, name, json_str)) = tool_blocks.remove(&idx) {
                            let arguments = if json_str.trim().is_empty() {
                                Map::new()
                            } else {
                                match serde_json::from_str::<Value>(&json_str) {
                                    Ok(Value::Object(map)) => map,
                                    _ => {
                                        log::warn!(
                                            "cloudllm::adapters::anthropic: malformed tool_use input JSON for '{}', using empty arguments",
                                            name
                                        );
                                        Map::new()
                                    }
                                }
                            };
                            finished_tool_calls.push(ToolCall::new(id, name, arguments));
                        }
                        block_index += 1;
                    }
                    "message_stop" => break,
                    _ => {}
                }
            }

            // An empty response (no content, no tool calls) is a
            // ProviderError, not a successful empty turn: withhold the
            // `Final` chunk so `call`'s drain finds no terminal response and
            // the streaming turn loop's own "no response from LLM" path
            // fires, rather than handing either caller a spurious empty
            // finish.
            if !full_content.is_empty() || !finished_tool_calls.is_empty() {
                let content = if full_content.is_empty() { None } else { Some(full_content) };
                yield StreamChunk::Final(LLMResponse::new(content, finished_tool_calls));
            }
        };

        Ok(stream.boxed())
    }
}
