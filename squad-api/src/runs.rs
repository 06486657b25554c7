//! Execution of one agent run, shared by the task route and the task
//! watcher.
//!
//! With a sandbox provider configured, the agent runs as a process in the
//! shared sandbox and its result is extracted from the sentinel-wrapped
//! stdout. Without one, the run happens host-side: directors through the
//! tool-driven agentic loop, specialists through a single chat call.

use crate::events::ControlEvent;
use crate::ws::WsState;
use squad_agents::{extract_output, SpecialistRuntime};
use squad_core::{AgentId, AgentStatus, AgentType, LlmError, SandboxError, SquadResult};
use squad_llm::{
    tool_catalogue, AgentLoop, AgentLoopConfig, ChatProvider, RegistryUsageSink, ToolExecutor,
    ToolObserver,
};
use squad_sandbox::SandboxOrchestrator;
use squad_store::{AgentDoc, Store};
use std::sync::Arc;
use tracing::{info, warn};

/// Runs agents either in the shared sandbox or host-side.
pub struct AgentRunner {
    store: Store,
    ws: Arc<WsState>,
    orchestrator: Option<Arc<SandboxOrchestrator>>,
    provider: Option<Arc<dyn ChatProvider>>,
}

impl AgentRunner {
    pub fn new(
        store: Store,
        ws: Arc<WsState>,
        orchestrator: Option<Arc<SandboxOrchestrator>>,
        provider: Option<Arc<dyn ChatProvider>>,
    ) -> Self {
        Self {
            store,
            ws,
            orchestrator,
            provider,
        }
    }

    /// Whether the agent currently has a running sandbox process.
    pub async fn is_running(&self, agent_id: &AgentId) -> bool {
        match &self.orchestrator {
            Some(orchestrator) => orchestrator.is_running(agent_id).await,
            None => false,
        }
    }

    /// Execute one agent run for `task_text` and return the extracted
    /// result. Status bookkeeping inside the sandbox is the runtime's own
    /// job; the host-side paths do it here.
    pub async fn run_agent_task(&self, agent: &AgentDoc, task_text: &str) -> SquadResult<String> {
        let agent_id: AgentId = agent.agent_id.parse().map_err(|_| {
            squad_core::StorageError::Backend {
                reason: format!("agent record carries non-UUID id {}", agent.agent_id),
            }
        })?;
        let parent_id: Option<AgentId> = match &agent.parent_id {
            Some(raw) => Some(raw.parse().map_err(|_| {
                squad_core::StorageError::Backend {
                    reason: format!("agent record carries non-UUID parent id {raw}"),
                }
            })?),
            None => None,
        };

        match &self.orchestrator {
            Some(orchestrator) => {
                self.run_in_sandbox(orchestrator, agent, agent_id, parent_id, task_text)
                    .await
            }
            None => self.run_host_side(agent, agent_id, parent_id, task_text).await,
        }
    }

    async fn run_in_sandbox(
        &self,
        orchestrator: &Arc<SandboxOrchestrator>,
        agent: &AgentDoc,
        agent_id: AgentId,
        parent_id: Option<AgentId>,
        task_text: &str,
    ) -> SquadResult<String> {
        orchestrator
            .register(agent_id, agent.agent_type, agent.specialization)
            .await?;

        let outcome = orchestrator.run_agent(agent_id, task_text, parent_id).await?;
        if outcome.exit_code != 0 {
            return Err(SandboxError::CommandFailed {
                reason: format!(
                    "agent process exited with code {}: {}",
                    outcome.exit_code,
                    outcome.stderr.trim()
                ),
            }
            .into());
        }

        Ok(extract_output(agent.agent_type, &outcome.stdout))
    }

    async fn run_host_side(
        &self,
        agent: &AgentDoc,
        agent_id: AgentId,
        parent_id: Option<AgentId>,
        task_text: &str,
    ) -> SquadResult<String> {
        let provider = self
            .provider
            .clone()
            .ok_or(LlmError::ProviderNotConfigured)?;
        let registry = self.store.agents();

        registry.get_or_create_session(&agent_id).await?;
        let resume_context = self.store.checkpoints().build_resume_context(&agent_id).await?;
        registry
            .update_status(&agent_id, AgentStatus::Working, None)
            .await?;

        let outcome = match agent.agent_type {
            AgentType::Director => {
                let executor = ToolExecutor::new(self.store.clone(), agent_id, AgentType::Director)
                    .with_observer(self.tool_observer(agent_id));
                let agent_loop = AgentLoop::new(
                    provider,
                    tool_catalogue(AgentType::Director),
                    Arc::new(executor),
                    Arc::new(RegistryUsageSink::new(registry.clone(), agent_id)),
                    AgentLoopConfig::new(squad_agents::prompts::director_system_prompt(
                        resume_context.as_deref(),
                    )),
                );
                agent_loop.run(task_text).await.map(|result| {
                    info!(
                        agent_id = %agent_id,
                        turns = result.turns,
                        end = ?result.end,
                        "Host-side director run finished"
                    );
                    result.final_text
                })
            }
            AgentType::Specialist => {
                SpecialistRuntime::new(
                    self.store.clone(),
                    provider,
                    agent_id,
                    agent.specialization.unwrap_or_default(),
                    parent_id,
                )
                .with_resume_context(resume_context)
                .run(task_text)
                .await
            }
        };

        match outcome {
            Ok(result) => {
                registry
                    .update_status(&agent_id, AgentStatus::Completed, None)
                    .await?;
                self.ws.broadcast(ControlEvent::AgentStatus {
                    agent_id: agent_id.to_string(),
                    status: AgentStatus::Completed.to_string(),
                });
                Ok(result)
            }
            Err(e) => {
                warn!(agent_id = %agent_id, error = %e, "Host-side run failed");
                registry
                    .update_status(&agent_id, AgentStatus::Error, None)
                    .await
                    .ok();
                self.ws.broadcast(ControlEvent::AgentStatus {
                    agent_id: agent_id.to_string(),
                    status: AgentStatus::Error.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Tool activity surfaces on the agent's output stream.
    fn tool_observer(&self, agent_id: AgentId) -> ToolObserver {
        let ws = self.ws.clone();
        Arc::new(move |tool_name, _input, result| {
            let mut rendered = result.to_string();
            if rendered.chars().count() > 200 {
                rendered = format!("{}...", rendered.chars().take(200).collect::<String>());
            }
            ws.broadcast(ControlEvent::AgentOutput {
                agent_id: agent_id.to_string(),
                stream: "stdout".to_string(),
                content: format!("[tool:{tool_name}] {rendered}"),
            });
        })
    }
}
