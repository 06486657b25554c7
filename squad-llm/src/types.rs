//! Chat API request and response types.
//!
//! The LLM is treated as an opaque chat endpoint that accepts system/user/
//! tool messages plus tool schemas and returns text and tool_use blocks.

use serde::{Deserialize, Serialize};
use squad_core::TokenDelta;

// ============================================================================
// MESSAGES AND CONTENT BLOCKS
// ============================================================================

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One block of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text
    Text { text: String },
    /// The model invoking a tool
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// A tool's result, echoed back to the model
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

impl ContentBlock {
    /// Shorthand for a text block.
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }
}

/// One message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl ChatMessage {
    /// A user message with a single text block.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// An assistant message carrying the model's original content blocks.
    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// A user message consisting of tool_result blocks.
    pub fn tool_results(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: blocks,
        }
    }
}

// ============================================================================
// TOOLS
// ============================================================================

/// Schema of one tool exposed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the tool input
    pub input_schema: serde_json::Value,
}

// ============================================================================
// REQUEST / RESPONSE
// ============================================================================

/// A chat request. The model identifier lives on the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: i32,
}

impl ChatRequest {
    /// A single-turn request: one system prompt, one user message.
    pub fn single_turn(
        system: impl Into<String>,
        user: impl Into<String>,
        max_tokens: i32,
    ) -> Self {
        Self {
            system: Some(system.into()),
            messages: vec![ChatMessage::user(user)],
            tools: Vec::new(),
            max_tokens,
        }
    }
}

/// Why the model stopped producing output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Natural end of the assistant turn
    EndTurn,
    /// Output budget exhausted mid-answer
    MaxTokens,
    /// The model wants tool results before continuing
    ToolUse,
    /// Anything else the provider reports
    Other(String),
}

impl StopReason {
    /// Parse the provider's wire string.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "end_turn" => StopReason::EndTurn,
            "max_tokens" => StopReason::MaxTokens,
            "tool_use" => StopReason::ToolUse,
            other => StopReason::Other(other.to_string()),
        }
    }
}

/// A chat response.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
    pub usage: TokenDelta,
}

impl ChatResponse {
    /// Concatenated text of every text block.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Every tool_use block, in response order.
    pub fn tool_uses(&self) -> Vec<(&str, &str, &serde_json::Value)> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input))
                }
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_block_wire_format() {
        let block = ContentBlock::ToolUse {
            id: "toolu_1".to_string(),
            name: "checkInbox".to_string(),
            input: serde_json::json!({ "limit": 5 }),
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "tool_use");
        assert_eq!(json["name"], "checkInbox");
    }

    #[test]
    fn test_tool_result_error_flag_skipped_when_false() {
        let ok = ContentBlock::ToolResult {
            tool_use_id: "toolu_1".to_string(),
            content: "{}".to_string(),
            is_error: false,
        };
        let json = serde_json::to_value(&ok).unwrap();
        assert!(json.get("is_error").is_none());

        let err = ContentBlock::ToolResult {
            tool_use_id: "toolu_1".to_string(),
            content: "boom".to_string(),
            is_error: true,
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["is_error"], true);
    }

    #[test]
    fn test_stop_reason_from_wire() {
        assert_eq!(StopReason::from_wire("end_turn"), StopReason::EndTurn);
        assert_eq!(StopReason::from_wire("max_tokens"), StopReason::MaxTokens);
        assert_eq!(StopReason::from_wire("tool_use"), StopReason::ToolUse);
        assert_eq!(
            StopReason::from_wire("pause_turn"),
            StopReason::Other("pause_turn".to_string())
        );
    }

    #[test]
    fn test_response_text_joins_blocks() {
        let response = ChatResponse {
            content: vec![
                ContentBlock::text("first"),
                ContentBlock::ToolUse {
                    id: "t".to_string(),
                    name: "n".to_string(),
                    input: serde_json::json!({}),
                },
                ContentBlock::text("second"),
            ],
            stop_reason: StopReason::EndTurn,
            usage: TokenDelta::default(),
        };
        assert_eq!(response.text(), "first\nsecond");
        assert_eq!(response.tool_uses().len(), 1);
    }
}
