//! Director orchestration loop: decompose, spawn and assign, wait,
//! aggregate, summarize.

use crate::prompts;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use squad_core::{
    AgentId, CheckpointSummary, MessageType, ResumePointer, Specialization, SquadResult, TaskId,
    TaskStatus, TokenDelta,
};
use squad_llm::{ChatProvider, ChatRequest};
use squad_store::{RegisterAgent, Store};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// One subtask produced by decomposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub title: String,
    pub description: String,
    pub specialization: Specialization,
}

#[derive(Debug, Deserialize)]
struct Decomposition {
    subtasks: Vec<Subtask>,
}

/// Parse the decomposition response: the first `{...}` JSON object
/// substring. Any parse failure falls back to a single general subtask
/// wrapping the whole task.
pub fn parse_decomposition(raw: &str, task: &str) -> Vec<Subtask> {
    let fallback = || {
        vec![Subtask {
            title: "Complete task".to_string(),
            description: task.to_string(),
            specialization: Specialization::General,
        }]
    };

    let Some(start) = raw.find('{') else {
        return fallback();
    };
    let Some(end) = raw.rfind('}') else {
        return fallback();
    };
    if end < start {
        return fallback();
    }

    match serde_json::from_str::<Decomposition>(&raw[start..=end]) {
        Ok(decomposition) if !decomposition.subtasks.is_empty() => decomposition.subtasks,
        _ => fallback(),
    }
}

/// Render the aggregated Markdown document: one level-2 heading per
/// successful subtask.
pub fn aggregate_results(results: &[(String, String)]) -> String {
    let mut out = String::new();
    for (title, result) in results {
        out.push_str(&format!("## {title}\n\n{result}\n\n"));
    }
    out.trim_end().to_string()
}

/// Configuration for the director loop.
#[derive(Debug, Clone)]
pub struct DirectorConfig {
    /// How long to wait for specialists before aggregating partial results
    pub wait_timeout: Duration,
    /// Task-board polling interval during the wait phase
    pub poll_interval: Duration,
    /// Output budget per LLM call
    pub max_tokens: i32,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(2),
            max_tokens: 4096,
        }
    }
}

/// The in-sandbox director runtime.
pub struct DirectorRuntime {
    store: Store,
    provider: Arc<dyn ChatProvider>,
    agent_id: AgentId,
    config: DirectorConfig,
}

impl DirectorRuntime {
    pub fn new(
        store: Store,
        provider: Arc<dyn ChatProvider>,
        agent_id: AgentId,
        config: DirectorConfig,
    ) -> Self {
        Self {
            store,
            provider,
            agent_id,
            config,
        }
    }

    /// Run the full orchestration loop and return the final output document.
    pub async fn run(&self, task: &str) -> SquadResult<String> {
        let mut tokens = TokenDelta::default();

        // Phase 1: decompose.
        let subtasks = self.decompose(task, &mut tokens).await?;
        self.checkpoint_phase(
            task,
            "spawning",
            "spawn specialists and assign tasks",
            vec![format!("decomposed into {} subtasks", subtasks.len())],
            subtasks.iter().map(|s| s.title.clone()).collect(),
            tokens,
            None,
        )
        .await?;

        // Phase 2: spawn specialists and assign one task each.
        let assignments = self.spawn_and_assign(&subtasks).await?;
        let spawned: Vec<String> = assignments
            .iter()
            .map(|(specialist, _, _)| specialist.to_string())
            .collect();
        self.checkpoint_phase(
            task,
            "waiting",
            "poll specialist tasks until terminal",
            vec![format!("spawned {} specialists", assignments.len())],
            vec!["collect specialist results".to_string()],
            tokens,
            Some(format!("specialists: {}", spawned.join(", "))),
        )
        .await?;

        // Phase 3: wait for specialists (partial completion is acceptable).
        self.store
            .agents()
            .update_status(&self.agent_id, squad_core::AgentStatus::Waiting, None)
            .await?;
        let completed = self.wait_for_specialists(&assignments).await?;
        self.store
            .agents()
            .update_status(&self.agent_id, squad_core::AgentStatus::Working, None)
            .await?;

        // Phase 4: aggregate successful results.
        let aggregated = aggregate_results(&completed);

        // Phase 5: executive summary.
        let summary = self.summarize(task, &aggregated, &mut tokens).await?;
        let output = if aggregated.is_empty() {
            summary
        } else {
            format!("{summary}\n\n{aggregated}")
        };

        self.checkpoint_phase(
            task,
            "complete",
            "done",
            vec![format!(
                "aggregated {} of {} specialist results",
                completed.len(),
                assignments.len()
            )],
            Vec::new(),
            tokens,
            None,
        )
        .await?;

        Ok(output)
    }

    async fn decompose(&self, task: &str, tokens: &mut TokenDelta) -> SquadResult<Vec<Subtask>> {
        let response = self
            .provider
            .chat(ChatRequest::single_turn(
                prompts::DECOMPOSE_SYSTEM_PROMPT,
                task,
                self.config.max_tokens,
            ))
            .await?;
        tokens.add(response.usage);
        self.store
            .agents()
            .add_tokens(&self.agent_id, response.usage)
            .await?;

        let subtasks = parse_decomposition(&response.text(), task);
        info!(count = subtasks.len(), "Task decomposed");
        Ok(subtasks)
    }

    async fn spawn_and_assign(
        &self,
        subtasks: &[Subtask],
    ) -> SquadResult<Vec<(AgentId, TaskId, String)>> {
        let mut assignments = Vec::with_capacity(subtasks.len());
        for subtask in subtasks {
            let specialist = self
                .store
                .agents()
                .register_agent(RegisterAgent::specialist(
                    subtask.specialization,
                    self.agent_id,
                ))
                .await?;
            let specialist_id: AgentId = specialist.agent_id.parse().map_err(|_| {
                squad_core::StorageError::Backend {
                    reason: format!("registry returned non-UUID agent id {}", specialist.agent_id),
                }
            })?;

            let task = self
                .store
                .tasks()
                .create_task(subtask.title.clone(), subtask.description.clone(), None)
                .await?;
            let task_id: TaskId = task.task_id.parse().map_err(|_| {
                squad_core::StorageError::Backend {
                    reason: format!("task store returned non-UUID task id {}", task.task_id),
                }
            })?;

            self.store.tasks().assign_task(&task_id, &specialist_id).await?;
            self.store
                .messages()
                .send_message(
                    &self.agent_id,
                    &specialist_id,
                    format!("{}\n\n{}", subtask.title, subtask.description),
                    MessageType::Task,
                    None,
                    None,
                )
                .await?;

            info!(
                specialist = %specialist_id,
                task = %task_id,
                specialization = %subtask.specialization,
                "Specialist spawned and task assigned"
            );
            assignments.push((specialist_id, task_id, subtask.title.clone()));
        }
        Ok(assignments)
    }

    /// Poll the assigned tasks until all are terminal or the timeout
    /// elapses. Returns (title, result) for the completed ones.
    async fn wait_for_specialists(
        &self,
        assignments: &[(AgentId, TaskId, String)],
    ) -> SquadResult<Vec<(String, String)>> {
        let deadline = Utc::now() + chrono::Duration::from_std(self.config.wait_timeout).unwrap_or_else(|_| chrono::Duration::seconds(120));

        loop {
            let mut all_terminal = true;
            let mut completed = Vec::new();

            for (_, task_id, title) in assignments {
                let task = self.store.tasks().require_task(task_id).await?;
                match task.status {
                    TaskStatus::Completed => {
                        completed.push((title.clone(), task.result.unwrap_or_default()));
                    }
                    TaskStatus::Failed => {}
                    _ => all_terminal = false,
                }
            }

            if all_terminal {
                return Ok(completed);
            }
            if Utc::now() >= deadline {
                warn!(
                    completed = completed.len(),
                    total = assignments.len(),
                    "Specialist wait timed out; aggregating partial results"
                );
                return Ok(completed);
            }

            self.store.agents().heartbeat(&self.agent_id).await?;
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn summarize(
        &self,
        task: &str,
        aggregated: &str,
        tokens: &mut TokenDelta,
    ) -> SquadResult<String> {
        let response = self
            .provider
            .chat(ChatRequest::single_turn(
                prompts::SUMMARY_SYSTEM_PROMPT,
                prompts::summary_request(task, aggregated),
                self.config.max_tokens,
            ))
            .await?;
        tokens.add(response.usage);
        self.store
            .agents()
            .add_tokens(&self.agent_id, response.usage)
            .await?;
        Ok(response.text())
    }

    #[allow(clippy::too_many_arguments)]
    async fn checkpoint_phase(
        &self,
        task: &str,
        phase: &str,
        next_action: &str,
        completed: Vec<String>,
        pending: Vec<String>,
        tokens: TokenDelta,
        context: Option<String>,
    ) -> SquadResult<()> {
        let mut pointer = ResumePointer::new(next_action, phase);
        if let Some(context) = context {
            pointer = pointer.with_context(context);
        }
        self.store
            .checkpoints()
            .create_checkpoint(
                &self.agent_id,
                CheckpointSummary {
                    goal: task.to_string(),
                    completed,
                    pending,
                    decisions: Vec::new(),
                },
                pointer,
                tokens.input_tokens + tokens.output_tokens,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decomposition_happy_path() {
        let raw = r#"Here is the plan:
{"subtasks": [
  {"title": "Find docs", "description": "search", "specialization": "researcher"},
  {"title": "Summarize", "description": "write", "specialization": "writer"}
]}
Done."#;
        let subtasks = parse_decomposition(raw, "task");
        assert_eq!(subtasks.len(), 2);
        assert_eq!(subtasks[0].title, "Find docs");
        assert_eq!(subtasks[0].specialization, Specialization::Researcher);
        assert_eq!(subtasks[1].specialization, Specialization::Writer);
    }

    #[test]
    fn test_parse_decomposition_prose_falls_back() {
        let subtasks = parse_decomposition("I think we should split the work.", "original task");
        assert_eq!(subtasks.len(), 1);
        assert_eq!(subtasks[0].title, "Complete task");
        assert_eq!(subtasks[0].description, "original task");
        assert_eq!(subtasks[0].specialization, Specialization::General);
    }

    #[test]
    fn test_parse_decomposition_bad_json_falls_back() {
        let subtasks = parse_decomposition("{\"subtasks\": [{\"title\": 3}]}", "t");
        assert_eq!(subtasks.len(), 1);
        assert_eq!(subtasks[0].title, "Complete task");
    }

    #[test]
    fn test_parse_decomposition_empty_list_falls_back() {
        let subtasks = parse_decomposition("{\"subtasks\": []}", "t");
        assert_eq!(subtasks.len(), 1);
    }

    #[test]
    fn test_parse_decomposition_unknown_specialization_falls_back() {
        let raw = r#"{"subtasks": [{"title": "x", "description": "y", "specialization": "wizard"}]}"#;
        let subtasks = parse_decomposition(raw, "t");
        assert_eq!(subtasks[0].specialization, Specialization::General);
        assert_eq!(subtasks[0].title, "Complete task");
    }

    #[test]
    fn test_aggregate_results_markdown_headings() {
        let aggregated = aggregate_results(&[
            ("Find docs".to_string(), "found them".to_string()),
            ("Summarize".to_string(), "summarized".to_string()),
        ]);
        assert!(aggregated.contains("## Find docs\n\nfound them"));
        assert!(aggregated.contains("## Summarize\n\nsummarized"));
    }

    #[test]
    fn test_aggregate_results_empty() {
        assert_eq!(aggregate_results(&[]), "");
    }
}
