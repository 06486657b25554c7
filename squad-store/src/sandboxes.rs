//! Sandbox tracking: one record per (sandbox, agent) pair.
//!
//! Pause/resume/kill timestamps are set once; the status field moves with
//! the shared sandbox. Records are never deleted, so the collection doubles
//! as the sandbox audit log.

use crate::documents::{SandboxDoc, SandboxLifecycleDoc};
use crate::{backend, is_duplicate_key};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::FindOptions;
use mongodb::Collection;
use squad_core::{
    AgentId, SandboxCosts, SandboxMetadata, SandboxResources, SandboxState, SquadResult,
    StorageError,
};
use tracing::debug;

/// Typed facade over the sandboxes collection.
#[derive(Debug, Clone)]
pub struct SandboxTracker {
    collection: Collection<SandboxDoc>,
}

impl SandboxTracker {
    pub fn new(collection: Collection<SandboxDoc>) -> Self {
        Self { collection }
    }

    /// Record an agent's attachment to a sandbox.
    pub async fn track(
        &self,
        sandbox_id: &str,
        agent_id: &AgentId,
        status: SandboxState,
        metadata: SandboxMetadata,
        resources: SandboxResources,
    ) -> SquadResult<SandboxDoc> {
        let now = Utc::now();
        let record = SandboxDoc {
            sandbox_id: sandbox_id.to_string(),
            agent_id: agent_id.to_string(),
            status,
            metadata,
            lifecycle: SandboxLifecycleDoc {
                created_at: now,
                paused_at: None,
                resumed_at: None,
                killed_at: None,
                last_heartbeat: now,
            },
            resources,
            costs: SandboxCosts::default(),
        };

        self.collection
            .insert_one(&record, None)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    StorageError::Duplicate {
                        entity: "sandbox",
                        id: format!("{sandbox_id}/{agent_id}"),
                    }
                } else {
                    backend(e)
                }
            })?;

        debug!(sandbox_id, agent_id = %agent_id, "Sandbox attachment tracked");
        Ok(record)
    }

    /// Every record for one sandbox (one per attached agent).
    pub async fn get_sandbox(&self, sandbox_id: &str) -> SquadResult<Vec<SandboxDoc>> {
        let options = FindOptions::builder()
            .sort(doc! { "lifecycle.createdAt": 1 })
            .build();
        let cursor = self
            .collection
            .find(doc! { "sandboxId": sandbox_id }, options)
            .await
            .map_err(backend)?;
        cursor.try_collect().await.map_err(|e| backend(e).into())
    }

    /// All sandbox records.
    pub async fn list(&self) -> SquadResult<Vec<SandboxDoc>> {
        let options = FindOptions::builder()
            .sort(doc! { "lifecycle.createdAt": -1 })
            .build();
        let cursor = self
            .collection
            .find(doc! {}, options)
            .await
            .map_err(backend)?;
        cursor.try_collect().await.map_err(|e| backend(e).into())
    }

    /// Mark every record of a sandbox paused. `pausedAt` is only written
    /// where still unset.
    pub async fn mark_paused(&self, sandbox_id: &str) -> SquadResult<()> {
        self.transition(sandbox_id, SandboxState::Paused, "pausedAt")
            .await
    }

    /// Mark every record of a sandbox active again. `resumedAt` is only
    /// written where still unset.
    pub async fn mark_resumed(&self, sandbox_id: &str) -> SquadResult<()> {
        self.transition(sandbox_id, SandboxState::Active, "resumedAt")
            .await
    }

    /// Mark every record of a sandbox killed. `killedAt` is only written
    /// where still unset.
    pub async fn mark_killed(&self, sandbox_id: &str) -> SquadResult<()> {
        self.transition(sandbox_id, SandboxState::Killed, "killedAt")
            .await
    }

    async fn transition(
        &self,
        sandbox_id: &str,
        status: SandboxState,
        stamp_field: &str,
    ) -> SquadResult<()> {
        // Status moves for every attachment.
        self.collection
            .update_many(
                doc! { "sandboxId": sandbox_id },
                doc! { "$set": { "status": status.as_db_str() } },
                None,
            )
            .await
            .map_err(backend)?;

        // The lifecycle stamp is set-once.
        let field = format!("lifecycle.{stamp_field}");
        self.collection
            .update_many(
                doc! { "sandboxId": sandbox_id, &field: null },
                doc! { "$set": { &field: mongodb::bson::DateTime::now() } },
                None,
            )
            .await
            .map_err(backend)?;

        debug!(sandbox_id, status = %status, "Sandbox records transitioned");
        Ok(())
    }

    /// Advance the lifecycle heartbeat on every record of a sandbox.
    pub async fn heartbeat(&self, sandbox_id: &str) -> SquadResult<()> {
        self.collection
            .update_many(
                doc! { "sandboxId": sandbox_id },
                doc! { "$set": { "lifecycle.lastHeartbeat": mongodb::bson::DateTime::now() } },
                None,
            )
            .await
            .map_err(backend)?;
        Ok(())
    }

    /// Record accrued runtime and estimated cost for one attachment.
    pub async fn record_costs(
        &self,
        sandbox_id: &str,
        agent_id: &AgentId,
        runtime_seconds: f64,
        estimated_cost: f64,
    ) -> SquadResult<()> {
        self.collection
            .update_one(
                doc! { "sandboxId": sandbox_id, "agentId": agent_id.to_string() },
                doc! { "$inc": {
                    "costs.runtimeSeconds": runtime_seconds,
                    "costs.estimatedCost": estimated_cost,
                } },
                None,
            )
            .await
            .map_err(backend)?;
        Ok(())
    }
}
