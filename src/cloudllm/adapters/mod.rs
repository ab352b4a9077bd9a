//! Provider adapters: normalize a [`Context`] into one vendor's wire format
//! and its response back into an [`LLMResponse`]. One implementation per
//! [`ProviderKind`](crate::cloudllm::provider::ProviderKind).

pub mod anthropic;
pub mod google;
pub mod openai;

mod http;

pub use anthropic::AnthropicAdapter;
pub use google::GoogleAdapter;
pub use openai::OpenAiAdapter;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use serde_json::Value;

use crate::cloudllm::agent::Agent;
use crate::cloudllm::context::Context;
use crate::cloudllm::error::ProviderError;
use crate::cloudllm::llm_response::LLMResponse;
use crate::cloudllm::provider::Provider;

/// One element of a streaming adapter call: either a text delta, or the
/// single terminal `LLMResponse` that always ends the stream.
#[derive(Debug, Clone)]
pub enum StreamChunk {
    Token(String),
    Final(LLMResponse),
}

/// The normalization contract every vendor backend implements.
///
/// `stream` defaults to buffering the whole response via `call` and
/// replaying it as one token followed by the final response — exactly the
/// fallback the reference implementation uses for any backend that doesn't
/// natively stream. Only [`AnthropicAdapter`] overrides it with true
/// token-level SSE streaming.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn call(
        &self,
        ctx: &Context,
        tool_schemas: &[Value],
        agent: &Agent,
        provider: &Provider,
    ) -> Result<LLMResponse, ProviderError>;

    async fn stream<'a>(
        &'a self,
        ctx: &'a Context,
        tool_schemas: &'a [Value],
        agent: &'a Agent,
        provider: &'a Provider,
    ) -> Result<BoxStream<'a, StreamChunk>, ProviderError> {
        let response = self.call(ctx, tool_schemas, agent, provider).await?;
        let mut chunks = Vec::new();
        if let Some(content) = response.content.clone() {
            if !content.is_empty() {
                chunks.push(StreamChunk::Token(content));
            }
        }
        chunks.push(StreamChunk::Final(response));
        Ok(stream::iter(chunks).boxed())
    }
}

/// An empty-response vendor reply (no content, no tool calls) is itself a
/// `ProviderError` — shared by every adapter's `call` implementation.
pub(crate) fn require_nonempty(
    provider_name: &str,
    response: LLMResponse,
) -> Result<LLMResponse, ProviderError> {
    let has_content = response.content.as_deref().map_or(false, |c| !c.is_empty());
    if !has_content && response.tool_calls.is_empty() {
        return Err(ProviderError::new(provider_name, "empty response from provider"));
    }
    Ok(response)
}
