//! Anthropic chat provider over HTTP.

use crate::types::{ChatMessage, ChatRequest, ChatResponse, ContentBlock, StopReason, ToolDefinition};
use crate::ChatProvider;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use squad_core::{LlmError, SquadResult, TokenDelta};
use tracing::debug;

const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const DEFAULT_MAX_TOKENS: i32 = 4096;
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic API client implementing [`ChatProvider`].
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AnthropicProvider {
    /// Create a provider for a specific model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.anthropic.com/v1".to_string(),
            model: model.into(),
        }
    }

    /// Create a provider with the default model.
    pub fn with_default_model(api_key: impl Into<String>) -> Self {
        Self::new(api_key, DEFAULT_MODEL)
    }

    /// Read `ANTHROPIC_API_KEY` (and optional `ANTHROPIC_MODEL`) from the
    /// environment.
    pub fn from_env() -> SquadResult<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            LlmError::InvalidApiKey {
                provider: "anthropic".to_string(),
            }
        })?;
        let model =
            std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Ok(Self::new(api_key, model))
    }

    /// Override the API base URL (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Default generation budget for a request that did not set one.
    pub fn default_max_tokens() -> i32 {
        DEFAULT_MAX_TOKENS
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    async fn chat(&self, request: ChatRequest) -> SquadResult<ChatResponse> {
        let max_tokens = if request.max_tokens > 0 {
            request.max_tokens
        } else {
            DEFAULT_MAX_TOKENS
        };
        let body = WireRequest {
            model: self.model.clone(),
            max_tokens,
            system: request.system,
            messages: request.messages,
            tools: request.tools,
        };

        let url = format!("{}/messages", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: "anthropic".to_string(),
                status: 0,
                message: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<WireError>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);

            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited {
                    provider: "anthropic".to_string(),
                },
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::InvalidApiKey {
                    provider: "anthropic".to_string(),
                },
                _ => LlmError::RequestFailed {
                    provider: "anthropic".to_string(),
                    status: status.as_u16() as i32,
                    message,
                },
            }
            .into());
        }

        let wire: WireResponse = response.json().await.map_err(|e| LlmError::InvalidResponse {
            provider: "anthropic".to_string(),
            reason: format!("failed to parse response: {e}"),
        })?;

        let stop_reason = wire
            .stop_reason
            .as_deref()
            .map(StopReason::from_wire)
            .unwrap_or(StopReason::EndTurn);

        debug!(
            input_tokens = wire.usage.input_tokens,
            output_tokens = wire.usage.output_tokens,
            ?stop_reason,
            "Chat call finished"
        );

        Ok(ChatResponse {
            content: wire.content,
            stop_reason,
            usage: TokenDelta::new(wire.usage.input_tokens, wire.usage.output_tokens),
        })
    }
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    max_tokens: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDefinition>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    input_tokens: i64,
    output_tokens: i64,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: WireErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    message: String,
}
