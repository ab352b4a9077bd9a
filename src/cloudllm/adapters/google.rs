//! Google generative-language normalization (`:generateContent`).

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::cloudllm::adapters::http::shared_http_client;
use crate::cloudllm::adapters::{require_nonempty, ProviderAdapter};
use crate::cloudllm::agent::Agent;
use crate::cloudllm::context::{Context, ContextMessage, ToolCall};
use crate::cloudllm::error::ProviderError;
use crate::cloudllm::llm_response::LLMResponse;
use crate::cloudllm::provider::Provider;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GoogleAdapter;

impl GoogleAdapter {
    pub fn new() -> Self {
        Self
    }

    /// `contents` is a list of `Content{role, parts}`. Consecutive `tool`
    /// messages batch into a single `function`-role `Content`, mirroring
    /// the vendor's expectation that every tool result answering one
    /// assistant turn arrives together.
    fn build_contents(ctx: &Context) -> Vec<Value> {
        let mut contents = Vec::new();
        let mut pending_function_parts: Vec<Value> = Vec::new();

        let flush = |pending: &mut Vec<Value>, contents: &mut Vec<Value>| {
            if !pending.is_empty() {
                contents.push(json!({"role": "function", "parts": std::mem::take(pending)}));
            }
        };

        for msg in ctx.messages() {
            match msg {
                ContextMessage::System { .. } => {}
                ContextMessage::User { content, .. } => {
                    flush(&mut pending_function_parts, &mut contents);
                    contents.push(json!({"role": "user", "parts": [{"text": content}]}));
                }
                ContextMessage::Assistant { content, tool_calls } => {
                    flush(&mut pending_function_parts, &mut contents);
                    let mut parts = Vec::new();
                    if let Some(text) = content {
                        if !text.is_empty() {
                            parts.push(json!({"text": text}));
                        }
                    }
                    for tc in tool_calls {
                        parts.push(json!({
                            "function_call": {"name": tc.name, "args": Value::Object(tc.arguments.clone())}
                        }));
                    }
                    contents.push(json!({"role": "model", "parts": parts}));
                }
                ContextMessage::Tool { tool_name, content, .. } => {
                    pending_function_parts.push(json!({
                        "function_response": {
                            "name": tool_name,
                            "response": {"result": content},
                        }
                    }));
                }
            }
        }
        flush(&mut pending_function_parts, &mut contents);
        contents
    }

    /// JSON-Schema → Google `Schema`, mapping `type` to the vendor's
    /// integer enum (`string:1, number:2, integer:3, boolean:4, array:5,
    /// object:6`) and recursing into `properties`/`items`.
    fn json_schema_to_google(schema: &Value) -> Value {
        let type_enum = |name: &str| -> i32 {
            match name {
                "string" => 1,
                "number" => 2,
                "integer" => 3,
                "boolean" => 4,
                "array" => 5,
                "object" => 6,
                _ => 1,
            }
        };

        let mut out = Map::new();
        if let Some(type_name) = schema.get("type").and_then(Value::as_str) {
            out.insert("type".to_string(), Value::from(type_enum(type_name)));
        }
        if let Some(description) = schema.get("description") {
            out.insert("description".to_string(), description.clone());
        }
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            let converted: Map<String, Value> = properties
                .iter()
                .map(|(k, v)| (k.clone(), Self::json_schema_to_google(v)))
                .collect();
            out.insert("properties".to_string(), Value::Object(converted));
        }
        if let Some(required) = schema.get("required") {
            out.insert("required".to_string(), required.clone());
        }
        if let Some(items) = schema.get("items") {
            out.insert("items".to_string(), Self::json_schema_to_google(items));
        }
        if let Some(enum_values) = schema.get("enum") {
            out.insert("enum".to_string(), enum_values.clone());
        }
        Value::Object(out)
    }

    fn build_tools(tool_schemas: &[Value]) -> Vec<Value> {
        if tool_schemas.is_empty() {
            return Vec::new();
        }
        let declarations: Vec<Value> = tool_schemas
            .iter()
            .map(|schema| {
                json!({
                    "name": schema.get("name"),
                    "description": schema.get("description"),
                    "parameters": schema.get("parameters").map(Self::json_schema_to_google),
                })
            })
            .collect();
        vec![json!({"function_declarations": declarations})]
    }

    fn parse_response(body: &Value) -> Result<LLMResponse, ProviderError> {
        let parts = body
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(Value::as_array)
            .ok_or_else(|| ProviderError::new("google", "malformed response: missing candidates[0].content.parts"))?;

        let mut content = None;
        let mut tool_calls = Vec::new();
        for part in parts {
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                content = Some(text.to_string());
            }
            if let Some(function_call) = part.get("function_call") {
                let name = function_call
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let arguments = function_call
                    .get("args")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                tool_calls.push(ToolCall::new(
                    format!("google-{}", Uuid::new_v4()),
                    name,
                    arguments,
                ));
            }
        }

        Ok(LLMResponse::new(content, tool_calls))
    }
}

impl Default for GoogleAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for GoogleAdapter {
    async fn call(
        &self,
        ctx: &Context,
        tool_schemas: &[Value],
        agent: &Agent,
        provider: &Provider,
    ) -> Result<LLMResponse, ProviderError> {
        let system_prompt = ctx.messages().iter().find_map(|m| match m {
            ContextMessage::System { content } => Some(content.clone()),
            _ => None,
        });

        let mut generation_config = Map::new();
        if let Some(max_tokens) = agent.max_output_tokens {
            generation_config.insert("maxOutputTokens".to_string(), Value::from(max_tokens));
        }
        generation_config.insert("temperature".to_string(), Value::from(agent.temperature));
        if agent.reasoning {
            generation_config.insert(
                "thinking_config".to_string(),
                json!({"thinking_budget": agent.reasoning_budget.unwrap_or(4096)}),
            );
        }

        let mut body = Map::new();
        body.insert("contents".to_string(), Value::Array(Self::build_contents(ctx)));
        if let Some(system_prompt) = system_prompt {
            body.insert(
                "systemInstruction".to_string(),
                json!({"parts": [{"text": system_prompt}]}),
            );
        }
        if !tool_schemas.is_empty() {
            body.insert("tools".to_string(), Value::Array(Self::build_tools(tool_schemas)));
        }
        body.insert("generationConfig".to_string(), Value::Object(generation_config));

        let base_url = provider.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let url = format!(
            "{}/{}:generateContent?key={}",
            base_url, agent.model, provider.api_key
        );
        let response = shared_http_client()
            .post(url)
            .json(&Value::Object(body))
            .send()
            .await
            .map_err(|e| ProviderError::new("google", e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::new("google", format!("HTTP {}: {}", status, text)));
        }

        let json_body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::new("google", e.to_string()))?;

        require_nonempty("google", Self::parse_response(&json_body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn type_mapping_matches_vendor_enum() {
        let schema = json!({"type": "object", "properties": {"q": {"type": "string"}}, "required": ["q"]});
        let converted = GoogleAdapter::json_schema_to_google(&schema);
        assert_eq!(converted["type"], 6);
        assert_eq!(converted["properties"]["q"]["type"], 1);
    }

    #[test]
    fn parses_function_call_with_synthesized_id() {
        let body = json!({
            "candidates": [{"content": {"parts": [
                {"function_call": {"name": "search", "args": {"q": "rust"}}}
            ]}}]
        });
        let response = GoogleAdapter::parse_response(&body).unwrap();
        assert_eq!(response.tool_calls.len(), 1);
        assert!(response.tool_calls[0].id.starts_with("google-"));
    }

    #[test]
    fn batches_consecutive_tool_messages() {
        let mut ctx = Context::new();
        ctx.add_tool_result("c1", "search", "result a");
        ctx.add_tool_result("c2", "uppercase", "result b");
        let contents = GoogleAdapter::build_contents(&ctx);
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0]["parts"].as_array().unwrap().len(), 2);
    }
}
