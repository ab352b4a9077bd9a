//! OpenAI chat-completions normalization (`/v1/chat/completions`).

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::cloudllm::adapters::http::shared_http_client;
use crate::cloudllm::adapters::{require_nonempty, ProviderAdapter};
use crate::cloudllm::agent::Agent;
use crate::cloudllm::context::{Context, ContextMessage, ToolCall};
use crate::cloudllm::error::ProviderError;
use crate::cloudllm::llm_response::LLMResponse;
use crate::cloudllm::provider::Provider;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiAdapter;

impl OpenAiAdapter {
    pub fn new() -> Self {
        Self
    }

    fn build_messages(system_prompt: &str, ctx: &Context) -> Vec<Value> {
        let mut messages = vec![json!({"role": "system", "content": system_prompt})];
        for msg in ctx.messages() {
            match msg {
                ContextMessage::System { .. } => {}
                ContextMessage::User { content, .. } => {
                    messages.push(json!({"role": "user", "content": content}));
                }
                ContextMessage::Assistant { content, tool_calls } => {
                    let mut entry = Map::new();
                    entry.insert("role".to_string(), Value::String("assistant".to_string()));
                    entry.insert(
                        "content".to_string(),
                        content.clone().map(Value::String).unwrap_or(Value::Null),
                    );
                    if !tool_calls.is_empty() {
                        let wire_calls: Vec<Value> = tool_calls
                            .iter()
                            .map(|tc| {
                                json!({
                                    "id": tc.id,
                                    "type": "function",
                                    "function": {
                                        "name": tc.name,
                                        "arguments": Value::Object(tc.arguments.clone()).to_string(),
                                    }
                                })
                            })
                            .collect();
                        entry.insert("tool_calls".to_string(), Value::Array(wire_calls));
                    }
                    messages.push(Value::Object(entry));
                }
                ContextMessage::Tool {
                    tool_call_id,
                    content,
                    ..
                } => {
                    messages.push(json!({
                        "role": "tool",
                        "tool_call_id": tool_call_id,
                        "content": content,
                    }));
                }
            }
        }
        messages
    }

    fn build_tools(tool_schemas: &[Value]) -> Vec<Value> {
        tool_schemas
            .iter()
            .map(|schema| json!({"type": "function", "function": schema}))
            .collect()
    }

    fn parse_response(body: &Value) -> Result<LLMResponse, ProviderError> {
        let message = body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .ok_or_else(|| ProviderError::new("openai", "malformed response: missing choices[0].message"))?;

        let content = message
            .get("content")
            .and_then(Value::as_str)
            .map(str::to_string);

        let tool_calls = message
            .get("tool_calls")
            .and_then(Value::as_array)
            .map(|calls| {
                calls
                    .iter()
                    .map(|call| {
                        let id = call.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
                        let function = call.get("function");
                        let name = function
                            .and_then(|f| f.get("name"))
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        let raw_args = function
                            .and_then(|f| f.get("arguments"))
                            .and_then(Value::as_str)
                            .unwrap_or("{}");
                        let arguments = match serde_json::from_str::<Value>(raw_args) {
                            Ok(Value::Object(map)) => map,
                            _ => {
                                let mut fallback = Map::new();
                                fallback.insert("raw".to_string(), Value::String(raw_args.to_string()));
                                fallback
                            }
                        };
                        ToolCall::new(id, name, arguments)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(LLMResponse::new(content, tool_calls))
    }
}

impl Default for OpenAiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    async fn call(
        &self,
        ctx: &Context,
        tool_schemas: &[Value],
        agent: &Agent,
        provider: &Provider,
    ) -> Result<LLMResponse, ProviderError> {
        let system_prompt = ctx
            .messages()
            .iter()
            .find_map(|m| match m {
                ContextMessage::System { content } => Some(content.clone()),
                _ => None,
            })
            .unwrap_or_default();

        let mut body = Map::new();
        body.insert("model".to_string(), Value::String(agent.model.clone()));
        body.insert(
            "messages".to_string(),
            Value::Array(Self::build_messages(&system_prompt, ctx)),
        );
        if let Some(max_tokens) = agent.max_output_tokens {
            body.insert("max_completion_tokens".to_string(), Value::from(max_tokens));
        }
        if !tool_schemas.is_empty() {
            body.insert("tools".to_string(), Value::Array(Self::build_tools(tool_schemas)));
        }
        if agent.reasoning {
            body.insert(
                "reasoning_effort".to_string(),
                Value::String(agent.reasoning_effort.clone()),
            );
        } else {
            body.insert("temperature".to_string(), Value::from(agent.temperature));
        }
        for (key, value) in &agent.extra {
            body.insert(key.clone(), value.clone());
        }

        let base_url = provider.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let response = shared_http_client()
            .post(format!("{}/chat/completions", base_url))
            .bearer_auth(&provider.api_key)
            .json(&Value::Object(body))
            .send()
            .await
            .map_err(|e| ProviderError::new("openai", e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(
                "openai",
                format!("HTTP {}: {}", status, text),
            ));
        }

        let json_body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::new("openai", e.to_string()))?;

        require_nonempty("openai", Self::parse_response(&json_body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloudllm::context::Context;
    use serde_json::json;

    #[test]
    fn with_system_context_produces_exactly_one_system_message() {
        let mut ctx = Context::with_system("You are a helpful assistant.");
        ctx.add_user("hi");
        let messages = OpenAiAdapter::build_messages("You are a helpful assistant.", &ctx);
        let system_count = messages
            .iter()
            .filter(|m| m.get("role").and_then(Value::as_str) == Some("system"))
            .count();
        assert_eq!(system_count, 1);
        assert_eq!(messages[0]["content"], "You are a helpful assistant.");
    }

    #[test]
    fn parses_text_response() {
        let body = json!({
            "choices": [{"message": {"content": "hi there"}}]
        });
        let response = OpenAiAdapter::parse_response(&body).unwrap();
        assert_eq!(response.content.as_deref(), Some("hi there"));
        assert!(response.tool_calls.is_empty());
    }

    #[test]
    fn parses_tool_call_with_valid_json_arguments() {
        let body = json!({
            "choices": [{"message": {
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "function": {"name": "search", "arguments": "{\"query\":\"rust\"}"}
                }]
            }}]
        });
        let response = OpenAiAdapter::parse_response(&body).unwrap();
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "search");
        assert_eq!(response.tool_calls[0].arguments.get("query").unwrap(), "rust");
    }

    #[test]
    fn malformed_arguments_fall_back_to_raw() {
        let body = json!({
            "choices": [{"message": {
                "tool_calls": [{
                    "id": "call_1",
                    "function": {"name": "search", "arguments": "not json"}
                }]
            }}]
        });
        let response = OpenAiAdapter::parse_response(&body).unwrap();
        assert_eq!(
            response.tool_calls[0].arguments.get("raw").unwrap(),
            "not json"
        );
    }
}
