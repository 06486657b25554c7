//! Multi-turn agentic loop: compose request → send → dispatch on
//! stop_reason → execute tools → splice results → continue.
//!
//! The loop is a pure driver over the [`ChatProvider`] and [`ToolHandler`]
//! seams; usage from every turn is accumulated and persisted through a
//! [`UsageSink`] before the next request is composed.

use crate::tools::ToolHandler;
use crate::types::{ChatMessage, ChatRequest, ContentBlock, StopReason, ToolDefinition};
use crate::ChatProvider;
use async_trait::async_trait;
use squad_core::{AgentId, SquadResult, TokenDelta};
use squad_store::AgentRegistry;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default cap on LLM exchanges per run.
pub const DEFAULT_MAX_TURNS: usize = 50;

/// Configuration for one agentic run.
#[derive(Debug, Clone)]
pub struct AgentLoopConfig {
    pub system_prompt: String,
    pub max_turns: usize,
    pub max_tokens: i32,
}

impl AgentLoopConfig {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            max_turns: DEFAULT_MAX_TURNS,
            max_tokens: 4096,
        }
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEnd {
    /// The model finished naturally
    EndTurn,
    /// The model ran out of output budget; the text is partial
    MaxTokens,
    /// The turn cap was reached without a natural end
    MaxTurns,
    /// The provider reported an unexpected stop reason
    Stopped(String),
}

/// Result of one agentic run.
#[derive(Debug, Clone)]
pub struct LoopResult {
    pub final_text: String,
    pub end: LoopEnd,
    pub usage: TokenDelta,
    pub turns: usize,
}

/// Persists per-turn token usage.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn record(&self, delta: TokenDelta) -> SquadResult<()>;
}

/// Sink that increments the agent registry's cumulative counters.
pub struct RegistryUsageSink {
    registry: AgentRegistry,
    agent_id: AgentId,
}

impl RegistryUsageSink {
    pub fn new(registry: AgentRegistry, agent_id: AgentId) -> Self {
        Self { registry, agent_id }
    }
}

#[async_trait]
impl UsageSink for RegistryUsageSink {
    async fn record(&self, delta: TokenDelta) -> SquadResult<()> {
        self.registry.add_tokens(&self.agent_id, delta).await
    }
}

/// Sink that drops usage on the floor (tests).
pub struct NullUsageSink;

#[async_trait]
impl UsageSink for NullUsageSink {
    async fn record(&self, _delta: TokenDelta) -> SquadResult<()> {
        Ok(())
    }
}

/// The agentic loop driver.
pub struct AgentLoop {
    provider: Arc<dyn ChatProvider>,
    tools: Vec<ToolDefinition>,
    handler: Arc<dyn ToolHandler>,
    sink: Arc<dyn UsageSink>,
    config: AgentLoopConfig,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        tools: Vec<ToolDefinition>,
        handler: Arc<dyn ToolHandler>,
        sink: Arc<dyn UsageSink>,
        config: AgentLoopConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            handler,
            sink,
            config,
        }
    }

    /// Run the loop with `task` as the first user message.
    pub async fn run(&self, task: &str) -> SquadResult<LoopResult> {
        let mut messages = vec![ChatMessage::user(task)];
        let mut total = TokenDelta::default();
        let mut last_text = String::new();

        for turn in 1..=self.config.max_turns {
            let request = ChatRequest {
                system: Some(self.config.system_prompt.clone()),
                messages: messages.clone(),
                tools: self.tools.clone(),
                max_tokens: self.config.max_tokens,
            };

            let response = self.provider.chat(request).await?;

            total.add(response.usage);
            self.sink.record(response.usage).await?;
            self.handler
                .on_usage(total.input_tokens + total.output_tokens);

            if let Some(text) = last_text_block(&response.content) {
                last_text = text.to_string();
            }

            match response.stop_reason.clone() {
                StopReason::EndTurn => {
                    debug!(turn, "Agentic loop finished naturally");
                    return Ok(LoopResult {
                        final_text: last_text,
                        end: LoopEnd::EndTurn,
                        usage: total,
                        turns: turn,
                    });
                }
                StopReason::MaxTokens => {
                    warn!(turn, "Model hit output budget; returning partial text");
                    return Ok(LoopResult {
                        final_text: last_text,
                        end: LoopEnd::MaxTokens,
                        usage: total,
                        turns: turn,
                    });
                }
                StopReason::ToolUse => {
                    let mut results = Vec::new();
                    for (id, name, input) in response.tool_uses() {
                        let (content, is_error) = match self.handler.handle(name, input).await {
                            Ok(value) => (
                                serde_json::to_string(&value)
                                    .unwrap_or_else(|_| value.to_string()),
                                false,
                            ),
                            Err(e) => (e.to_string(), true),
                        };
                        debug!(turn, tool = name, is_error, "Tool executed");
                        results.push(ContentBlock::ToolResult {
                            tool_use_id: id.to_string(),
                            content,
                            is_error,
                        });
                    }
                    messages.push(ChatMessage::assistant(response.content));
                    messages.push(ChatMessage::tool_results(results));
                }
                StopReason::Other(reason) => {
                    warn!(turn, reason = %reason, "Unexpected stop reason; exiting");
                    return Ok(LoopResult {
                        final_text: last_text,
                        end: LoopEnd::Stopped(reason),
                        usage: total,
                        turns: turn,
                    });
                }
            }
        }

        warn!(max_turns = self.config.max_turns, "Agentic loop hit turn cap");
        Ok(LoopResult {
            final_text: last_text,
            end: LoopEnd::MaxTurns,
            usage: total,
            turns: self.config.max_turns,
        })
    }
}

/// The last text block of a response, if any.
fn last_text_block(content: &[ContentBlock]) -> Option<&str> {
    content.iter().rev().find_map(|block| match block {
        ContentBlock::Text { text } => Some(text.as_str()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockChatProvider, ScriptedToolHandler};
    use crate::types::ChatResponse;
    use serde_json::json;
    use squad_core::AgentType;

    fn text_response(text: &str, stop: StopReason, input: i64, output: i64) -> ChatResponse {
        ChatResponse {
            content: vec![ContentBlock::text(text)],
            stop_reason: stop,
            usage: TokenDelta::new(input, output),
        }
    }

    fn tool_response(name: &str, input: serde_json::Value) -> ChatResponse {
        ChatResponse {
            content: vec![
                ContentBlock::text("let me check"),
                ContentBlock::ToolUse {
                    id: "toolu_1".to_string(),
                    name: name.to_string(),
                    input,
                },
            ],
            stop_reason: StopReason::ToolUse,
            usage: TokenDelta::new(10, 5),
        }
    }

    fn make_loop(provider: MockChatProvider, handler: ScriptedToolHandler) -> AgentLoop {
        AgentLoop::new(
            Arc::new(provider),
            crate::tools::tool_catalogue(AgentType::Director),
            Arc::new(handler),
            Arc::new(NullUsageSink),
            AgentLoopConfig::new("you are a director").with_max_turns(5),
        )
    }

    #[tokio::test]
    async fn test_single_turn_end() {
        let provider =
            MockChatProvider::new(vec![text_response("done", StopReason::EndTurn, 100, 20)]);
        let agent_loop = make_loop(provider, ScriptedToolHandler::default());

        let result = agent_loop.run("do something").await.unwrap();
        assert_eq!(result.final_text, "done");
        assert_eq!(result.end, LoopEnd::EndTurn);
        assert_eq!(result.turns, 1);
        assert_eq!(result.usage, TokenDelta::new(100, 20));
    }

    #[tokio::test]
    async fn test_tool_use_splices_results() {
        let provider = MockChatProvider::new(vec![
            tool_response("getTaskStatus", json!({ "taskId": "t1" })),
            text_response("all good", StopReason::EndTurn, 20, 10),
        ]);
        let handler =
            ScriptedToolHandler::default().with_result("getTaskStatus", json!({ "status": "completed" }));
        let agent_loop = make_loop(provider.clone(), handler.clone());

        let result = agent_loop.run("check the task").await.unwrap();
        assert_eq!(result.final_text, "all good");
        assert_eq!(result.turns, 2);
        // input + tool round trip accumulated
        assert_eq!(result.usage, TokenDelta::new(30, 15));

        // the second request must contain assistant blocks then tool results
        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        let followup = &requests[1].messages;
        assert_eq!(followup.len(), 3);
        match &followup[2].content[0] {
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                assert_eq!(tool_use_id, "toolu_1");
                assert!(content.contains("completed"));
                assert!(!is_error);
            }
            other => panic!("expected tool result, got {other:?}"),
        }

        let calls = handler.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "getTaskStatus");
    }

    #[tokio::test]
    async fn test_tool_error_sets_flag() {
        let provider = MockChatProvider::new(vec![
            tool_response("readMessage", json!({ "messageId": "nope" })),
            text_response("recovered", StopReason::EndTurn, 5, 5),
        ]);
        let handler = ScriptedToolHandler::default(); // no scripted result -> error
        let agent_loop = make_loop(provider.clone(), handler);

        let result = agent_loop.run("read it").await.unwrap();
        assert_eq!(result.end, LoopEnd::EndTurn);

        let requests = provider.requests();
        match &requests[1].messages[2].content[0] {
            ContentBlock::ToolResult { is_error, .. } => assert!(is_error),
            other => panic!("expected tool result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_max_tokens_returns_partial() {
        let provider = MockChatProvider::new(vec![text_response(
            "partial answ",
            StopReason::MaxTokens,
            50,
            4096,
        )]);
        let agent_loop = make_loop(provider, ScriptedToolHandler::default());

        let result = agent_loop.run("long task").await.unwrap();
        assert_eq!(result.end, LoopEnd::MaxTokens);
        assert_eq!(result.final_text, "partial answ");
    }

    #[tokio::test]
    async fn test_unknown_stop_reason_exits_defensively() {
        let provider = MockChatProvider::new(vec![text_response(
            "odd",
            StopReason::Other("pause_turn".to_string()),
            1,
            1,
        )]);
        let agent_loop = make_loop(provider, ScriptedToolHandler::default());

        let result = agent_loop.run("task").await.unwrap();
        assert_eq!(result.end, LoopEnd::Stopped("pause_turn".to_string()));
    }

    #[tokio::test]
    async fn test_turn_cap_reports_max_turns() {
        // Always asks for a tool; never ends naturally.
        let responses: Vec<ChatResponse> = (0..5)
            .map(|_| tool_response("checkInbox", json!({})))
            .collect();
        let provider = MockChatProvider::new(responses);
        let handler = ScriptedToolHandler::default().with_result("checkInbox", json!({ "messages": [] }));
        let agent_loop = make_loop(provider, handler);

        let result = agent_loop.run("task").await.unwrap();
        assert_eq!(result.end, LoopEnd::MaxTurns);
        assert_eq!(result.turns, 5);
        // 5 turns x (10, 5)
        assert_eq!(result.usage, TokenDelta::new(50, 25));
    }
}
