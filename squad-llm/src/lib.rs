//! SQUAD LLM - Chat Provider Abstraction and Agentic Loop
//!
//! The LLM is an opaque chat API: system/user/tool messages in, text and
//! tool_use blocks out. This crate defines the [`ChatProvider`] seam, the
//! Anthropic implementation, the tool catalogue an agent may call, and the
//! multi-turn [`AgentLoop`] that splices tool results back into the
//! conversation. Calls are never retried here.

mod agent_loop;
mod anthropic;
pub mod mock;
mod tools;
mod types;

pub use agent_loop::{
    AgentLoop, AgentLoopConfig, LoopEnd, LoopResult, NullUsageSink, RegistryUsageSink, UsageSink,
    DEFAULT_MAX_TURNS,
};
pub use anthropic::AnthropicProvider;
pub use tools::{tool_catalogue, ToolExecutor, ToolHandler, ToolObserver};
pub use types::{
    ChatMessage, ChatRequest, ChatResponse, ContentBlock, Role, StopReason, ToolDefinition,
};

use async_trait::async_trait;
use squad_core::SquadResult;

/// Trait for chat completion providers.
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Execute one chat exchange.
    ///
    /// # Returns
    /// * `Ok(ChatResponse)` - content blocks, stop reason, and token usage
    /// * `Err(SquadError::Llm)` - on any provider failure (not retried)
    async fn chat(&self, request: ChatRequest) -> SquadResult<ChatResponse>;
}
