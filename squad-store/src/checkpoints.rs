//! Append-only checkpoint store and resume-context rendering.
//!
//! Checkpoints are the only durable "process state" an agent has: restart
//! means a fresh process plus the rendered context of the latest checkpoint
//! injected into the system prompt.

use crate::documents::CheckpointDoc;
use crate::{backend, is_duplicate_key};
use chrono::Utc;
use mongodb::bson::doc;
use mongodb::options::FindOneOptions;
use mongodb::Collection;
use squad_core::{
    AgentId, CheckpointId, CheckpointSummary, EntityIdType, ResumePointer, SquadResult,
    StorageError,
};
use tracing::debug;

/// Render the human-readable resume block for a checkpoint. The text is
/// injected verbatim into the agent's system prompt on its next run.
pub fn render_resume_context(checkpoint: &CheckpointDoc) -> String {
    let mut out = String::new();
    out.push_str("## Resuming from checkpoint\n\n");
    out.push_str(&format!("Goal: {}\n", checkpoint.summary.goal));

    if !checkpoint.summary.completed.is_empty() {
        out.push_str("\nCompleted:\n");
        for item in &checkpoint.summary.completed {
            out.push_str(&format!("- {item}\n"));
        }
    }
    if !checkpoint.summary.pending.is_empty() {
        out.push_str("\nPending:\n");
        for item in &checkpoint.summary.pending {
            out.push_str(&format!("- {item}\n"));
        }
    }
    if !checkpoint.summary.decisions.is_empty() {
        out.push_str("\nDecisions:\n");
        for item in &checkpoint.summary.decisions {
            out.push_str(&format!("- {item}\n"));
        }
    }

    out.push_str(&format!(
        "\nNext action: {}\nPhase: {}\n",
        checkpoint.resume_pointer.next_action, checkpoint.resume_pointer.phase
    ));
    if let Some(context) = &checkpoint.resume_pointer.current_context {
        out.push_str(&format!("Context: {context}\n"));
    }
    out
}

/// Typed facade over the checkpoints collection.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    collection: Collection<CheckpointDoc>,
}

impl CheckpointStore {
    pub fn new(collection: Collection<CheckpointDoc>) -> Self {
        Self { collection }
    }

    /// Append a checkpoint. Checkpoints are never updated or deleted.
    pub async fn create_checkpoint(
        &self,
        agent_id: &AgentId,
        summary: CheckpointSummary,
        resume_pointer: ResumePointer,
        tokens_used: i64,
    ) -> SquadResult<CheckpointDoc> {
        summary.validate()?;
        resume_pointer.validate()?;

        let checkpoint = CheckpointDoc {
            checkpoint_id: CheckpointId::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            summary,
            resume_pointer,
            tokens_used,
            created_at: Utc::now(),
        };

        self.collection
            .insert_one(&checkpoint, None)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    StorageError::Duplicate {
                        entity: "checkpoint",
                        id: checkpoint.checkpoint_id.clone(),
                    }
                } else {
                    backend(e)
                }
            })?;

        debug!(
            checkpoint_id = %checkpoint.checkpoint_id,
            agent_id = %checkpoint.agent_id,
            phase = %checkpoint.resume_pointer.phase,
            "Checkpoint written"
        );
        Ok(checkpoint)
    }

    /// The most recent checkpoint for an agent: strictly greatest
    /// `createdAt`, with `_id` as a stable tie-break for equal timestamps.
    pub async fn latest_checkpoint(
        &self,
        agent_id: &AgentId,
    ) -> SquadResult<Option<CheckpointDoc>> {
        let options = FindOneOptions::builder()
            .sort(doc! { "createdAt": -1, "_id": -1 })
            .build();
        self.collection
            .find_one(doc! { "agentId": agent_id.to_string() }, options)
            .await
            .map_err(|e| backend(e).into())
    }

    /// Rendered resume text for the latest checkpoint, or `None` if the
    /// agent has never checkpointed.
    pub async fn build_resume_context(&self, agent_id: &AgentId) -> SquadResult<Option<String>> {
        Ok(self
            .latest_checkpoint(agent_id)
            .await?
            .map(|cp| render_resume_context(&cp)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_checkpoint() -> CheckpointDoc {
        CheckpointDoc {
            checkpoint_id: "c1".to_string(),
            agent_id: "a1".to_string(),
            summary: CheckpointSummary {
                goal: "Research coordination patterns".to_string(),
                completed: vec!["found three papers".to_string()],
                pending: vec!["summarize findings".to_string()],
                decisions: vec!["focus on change streams".to_string()],
            },
            resume_pointer: ResumePointer::new("write summary", "waiting")
                .with_context("2 of 3 specialists done"),
            tokens_used: 1234,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_resume_context_contains_every_element() {
        let cp = sample_checkpoint();
        let text = render_resume_context(&cp);

        assert!(text.contains("Research coordination patterns"));
        for item in cp
            .summary
            .completed
            .iter()
            .chain(&cp.summary.pending)
            .chain(&cp.summary.decisions)
        {
            assert!(text.contains(item), "missing element: {item}");
        }
        assert!(text.contains("write summary"));
        assert!(text.contains("waiting"));
        assert!(text.contains("2 of 3 specialists done"));
    }

    #[test]
    fn test_resume_context_omits_empty_sections() {
        let mut cp = sample_checkpoint();
        cp.summary.completed.clear();
        cp.summary.decisions.clear();
        cp.resume_pointer.current_context = None;

        let text = render_resume_context(&cp);
        assert!(!text.contains("Completed:"));
        assert!(!text.contains("Decisions:"));
        assert!(!text.contains("Context:"));
        assert!(text.contains("Pending:"));
    }
}
