//! Agent registry: records, sessions, token counters, heartbeat.

use crate::documents::{AgentDoc, TokenUsageDoc};
use crate::{backend, is_duplicate_key};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Collection;
use rand::Rng;
use squad_core::{
    AgentId, AgentSandboxStatus, AgentStatus, AgentType, EntityIdType, Specialization, SquadResult,
    StorageError, TaskId, TokenDelta,
};
use tracing::{debug, info};

/// Parameters for registering a new agent record.
#[derive(Debug, Clone)]
pub struct RegisterAgent {
    /// Explicit id; a fresh UUID v4 when absent. Re-registering an existing
    /// id fails on the unique index.
    pub agent_id: Option<AgentId>,
    pub agent_type: AgentType,
    pub specialization: Option<Specialization>,
    /// Director that spawned this specialist. Must be set for specialists.
    pub parent_id: Option<AgentId>,
}

impl RegisterAgent {
    /// A new director record.
    pub fn director() -> Self {
        Self {
            agent_id: None,
            agent_type: AgentType::Director,
            specialization: None,
            parent_id: None,
        }
    }

    /// A new specialist spawned by `parent_id`.
    pub fn specialist(specialization: Specialization, parent_id: AgentId) -> Self {
        Self {
            agent_id: None,
            agent_type: AgentType::Specialist,
            specialization: Some(specialization),
            parent_id: Some(parent_id),
        }
    }

    /// Pin the agent id instead of generating one.
    pub fn with_id(mut self, agent_id: AgentId) -> Self {
        self.agent_id = Some(agent_id);
        self
    }
}

/// Generate a durable session id: `session-<epoch-millis>-<9 base36 chars>`.
pub(crate) fn new_session_id() -> String {
    const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("session-{}-{}", Utc::now().timestamp_millis(), suffix)
}

/// Typed facade over the agents collection.
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    collection: Collection<AgentDoc>,
}

impl AgentRegistry {
    pub fn new(collection: Collection<AgentDoc>) -> Self {
        Self { collection }
    }

    /// Create an agent record. Fails with a duplicate error when the id is
    /// already registered (unique index on `agentId`).
    pub async fn register_agent(&self, params: RegisterAgent) -> SquadResult<AgentDoc> {
        let now = Utc::now();
        let agent = AgentDoc {
            agent_id: params
                .agent_id
                .unwrap_or_else(AgentId::new_v4)
                .to_string(),
            agent_type: params.agent_type,
            specialization: params.specialization,
            status: AgentStatus::Idle,
            sandbox_id: None,
            sandbox_status: AgentSandboxStatus::None,
            parent_id: params.parent_id.map(|id| id.to_string()),
            task_id: None,
            session_id: None,
            token_usage: TokenUsageDoc::default(),
            created_at: now,
            last_heartbeat: now,
        };

        self.collection
            .insert_one(&agent, None)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    StorageError::Duplicate {
                        entity: "agent",
                        id: agent.agent_id.clone(),
                    }
                } else {
                    backend(e)
                }
            })?;

        info!(
            agent_id = %agent.agent_id,
            agent_type = %agent.agent_type,
            "Agent registered"
        );
        Ok(agent)
    }

    /// Fetch one agent.
    pub async fn get_agent(&self, agent_id: &AgentId) -> SquadResult<Option<AgentDoc>> {
        self.collection
            .find_one(doc! { "agentId": agent_id.to_string() }, None)
            .await
            .map_err(|e| backend(e).into())
    }

    /// Fetch one agent or fail with NotFound.
    pub async fn require_agent(&self, agent_id: &AgentId) -> SquadResult<AgentDoc> {
        self.get_agent(agent_id).await?.ok_or_else(|| {
            StorageError::NotFound {
                entity: "agent",
                id: agent_id.to_string(),
            }
            .into()
        })
    }

    /// List agents, optionally filtered by type and status.
    pub async fn list_agents(
        &self,
        agent_type: Option<AgentType>,
        status: Option<AgentStatus>,
    ) -> SquadResult<Vec<AgentDoc>> {
        let mut filter = doc! {};
        if let Some(t) = agent_type {
            filter.insert("type", t.as_db_str());
        }
        if let Some(s) = status {
            filter.insert("status", s.as_db_str());
        }
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": 1 })
            .build();
        let cursor = self
            .collection
            .find(filter, options)
            .await
            .map_err(backend)?;
        cursor.try_collect().await.map_err(|e| backend(e).into())
    }

    /// Update an agent's status (and optionally its current task), advancing
    /// the heartbeat as a side effect.
    pub async fn update_status(
        &self,
        agent_id: &AgentId,
        status: AgentStatus,
        task_id: Option<&TaskId>,
    ) -> SquadResult<AgentDoc> {
        let mut set = doc! {
            "status": status.as_db_str(),
            "lastHeartbeat": mongodb::bson::DateTime::now(),
        };
        if let Some(task_id) = task_id {
            set.insert("taskId", task_id.to_string());
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let updated = self
            .collection
            .find_one_and_update(
                doc! { "agentId": agent_id.to_string() },
                doc! { "$set": set },
                options,
            )
            .await
            .map_err(backend)?;

        updated.ok_or_else(|| {
            StorageError::NotFound {
                entity: "agent",
                id: agent_id.to_string(),
            }
            .into()
        })
    }

    /// Advance the heartbeat without touching status.
    pub async fn heartbeat(&self, agent_id: &AgentId) -> SquadResult<()> {
        self.collection
            .update_one(
                doc! { "agentId": agent_id.to_string() },
                doc! { "$set": { "lastHeartbeat": mongodb::bson::DateTime::now() } },
                None,
            )
            .await
            .map_err(backend)?;
        Ok(())
    }

    /// Return the agent's durable session id, generating and persisting one
    /// on first use. The id survives restarts and correlates resume runs.
    pub async fn get_or_create_session(&self, agent_id: &AgentId) -> SquadResult<String> {
        let agent = self.require_agent(agent_id).await?;
        if let Some(session_id) = agent.session_id {
            return Ok(session_id);
        }

        let candidate = new_session_id();
        // Only claim the session slot if still unset, so a concurrent first
        // run cannot produce two session ids for one agent.
        self.collection
            .update_one(
                doc! { "agentId": agent_id.to_string(), "sessionId": null },
                doc! { "$set": { "sessionId": &candidate } },
                None,
            )
            .await
            .map_err(backend)?;

        let agent = self.require_agent(agent_id).await?;
        agent.session_id.ok_or_else(|| {
            StorageError::UpdateFailed {
                entity: "agent",
                id: agent_id.to_string(),
                reason: "session id not persisted".to_string(),
            }
            .into()
        })
    }

    /// Atomically add one LLM call's token usage to the cumulative counters
    /// and advance the heartbeat. Counters never decrease.
    pub async fn add_tokens(&self, agent_id: &AgentId, delta: TokenDelta) -> SquadResult<()> {
        let result = self
            .collection
            .update_one(
                doc! { "agentId": agent_id.to_string() },
                doc! {
                    "$inc": {
                        "tokenUsage.totalInputTokens": delta.input_tokens,
                        "tokenUsage.totalOutputTokens": delta.output_tokens,
                    },
                    "$set": {
                        "tokenUsage.lastUpdated": mongodb::bson::DateTime::now(),
                        "lastHeartbeat": mongodb::bson::DateTime::now(),
                    },
                },
                None,
            )
            .await
            .map_err(backend)?;

        if result.matched_count == 0 {
            return Err(StorageError::NotFound {
                entity: "agent",
                id: agent_id.to_string(),
            }
            .into());
        }
        debug!(
            agent_id = %agent_id,
            input = delta.input_tokens,
            output = delta.output_tokens,
            "Token usage recorded"
        );
        Ok(())
    }

    /// Attach an agent to a sandbox (or update its attachment status).
    pub async fn set_sandbox(
        &self,
        agent_id: &AgentId,
        sandbox_id: Option<&str>,
        status: AgentSandboxStatus,
    ) -> SquadResult<()> {
        let mut set = doc! { "sandboxStatus": status.as_db_str() };
        match sandbox_id {
            Some(id) => set.insert("sandboxId", id),
            None => set.insert("sandboxId", mongodb::bson::Bson::Null),
        };
        self.collection
            .update_one(
                doc! { "agentId": agent_id.to_string() },
                doc! { "$set": set },
                None,
            )
            .await
            .map_err(backend)?;
        Ok(())
    }

    /// Flip the sandbox attachment status of every agent in a sandbox.
    /// Used when the shared sandbox pauses, resumes, or dies.
    pub async fn set_sandbox_status_all(
        &self,
        sandbox_id: &str,
        status: AgentSandboxStatus,
    ) -> SquadResult<u64> {
        let result = self
            .collection
            .update_many(
                doc! { "sandboxId": sandbox_id },
                doc! { "$set": { "sandboxStatus": status.as_db_str() } },
                None,
            )
            .await
            .map_err(backend)?;
        Ok(result.modified_count)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_shape() {
        let id = new_session_id();
        let parts: Vec<&str> = id.splitn(3, '-').collect();
        assert_eq!(parts[0], "session");
        assert!(parts[1].parse::<i64>().is_ok(), "epoch millis: {}", parts[1]);
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_session_ids_are_distinct() {
        let a = new_session_id();
        let b = new_session_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_register_builders() {
        let director = RegisterAgent::director();
        assert_eq!(director.agent_type, AgentType::Director);
        assert!(director.parent_id.is_none());

        let parent = AgentId::new_v4();
        let specialist = RegisterAgent::specialist(Specialization::Writer, parent);
        assert_eq!(specialist.agent_type, AgentType::Specialist);
        assert_eq!(specialist.specialization, Some(Specialization::Writer));
        assert_eq!(specialist.parent_id, Some(parent));
    }
}
