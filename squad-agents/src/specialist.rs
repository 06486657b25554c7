//! Specialist execution loop: one LLM call, one checkpoint, one result
//! message back to the director.

use crate::prompts;
use squad_core::{
    AgentId, CheckpointSummary, MessageType, ResumePointer, Specialization, SquadResult,
    TokenDelta,
};
use squad_llm::{ChatProvider, ChatRequest};
use squad_store::Store;
use std::sync::Arc;
use tracing::info;

/// The in-sandbox specialist runtime.
pub struct SpecialistRuntime {
    store: Store,
    provider: Arc<dyn ChatProvider>,
    agent_id: AgentId,
    specialization: Specialization,
    parent_id: Option<AgentId>,
    resume_context: Option<String>,
    max_tokens: i32,
}

impl SpecialistRuntime {
    pub fn new(
        store: Store,
        provider: Arc<dyn ChatProvider>,
        agent_id: AgentId,
        specialization: Specialization,
        parent_id: Option<AgentId>,
    ) -> Self {
        Self {
            store,
            provider,
            agent_id,
            specialization,
            parent_id,
            resume_context: None,
            max_tokens: 4096,
        }
    }

    /// Inject the rendered resume context into the system prompt.
    pub fn with_resume_context(mut self, context: Option<String>) -> Self {
        self.resume_context = context;
        self
    }

    /// Execute the task and return the produced content.
    pub async fn run(&self, task: &str) -> SquadResult<String> {
        let system =
            prompts::specialist_system_prompt(self.specialization, self.resume_context.as_deref());
        let response = self
            .provider
            .chat(ChatRequest::single_turn(system, task, self.max_tokens))
            .await?;

        let usage: TokenDelta = response.usage;
        self.store.agents().add_tokens(&self.agent_id, usage).await?;

        let content = response.text();

        self.store
            .checkpoints()
            .create_checkpoint(
                &self.agent_id,
                CheckpointSummary {
                    goal: task.to_string(),
                    completed: vec!["produced result".to_string()],
                    pending: Vec::new(),
                    decisions: Vec::new(),
                },
                ResumePointer::new("none", "complete"),
                usage.input_tokens + usage.output_tokens,
            )
            .await?;

        if let Some(parent_id) = &self.parent_id {
            self.store
                .messages()
                .send_message(
                    &self.agent_id,
                    parent_id,
                    content.clone(),
                    MessageType::Result,
                    None,
                    None,
                )
                .await?;
            info!(parent = %parent_id, "Result message sent to director");
        }

        Ok(content)
    }
}
