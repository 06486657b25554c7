//! Task store: CRUD, assignment, and the forward-only status DAG.
//!
//! Status moves pending → assigned → in_progress → {completed, failed} and
//! never backward. Terminal tasks are immutable.

use crate::documents::TaskDoc;
use crate::{backend, is_duplicate_key};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Collection;
use squad_core::{
    AgentId, EntityIdType, SquadResult, StorageError, TaskError, TaskId, TaskStatus,
};
use tracing::debug;

/// Typed facade over the tasks collection.
#[derive(Debug, Clone)]
pub struct TaskStore {
    collection: Collection<TaskDoc>,
}

impl TaskStore {
    pub fn new(collection: Collection<TaskDoc>) -> Self {
        Self { collection }
    }

    /// Create a new `pending` task.
    pub async fn create_task(
        &self,
        title: impl Into<String>,
        description: impl Into<String>,
        parent_task_id: Option<TaskId>,
    ) -> SquadResult<TaskDoc> {
        let now = Utc::now();
        let task = TaskDoc {
            task_id: TaskId::new_v4().to_string(),
            parent_task_id: parent_task_id.map(|id| id.to_string()),
            assigned_to: None,
            title: title.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            result: None,
            created_at: now,
            updated_at: now,
        };

        self.collection.insert_one(&task, None).await.map_err(|e| {
            if is_duplicate_key(&e) {
                StorageError::Duplicate {
                    entity: "task",
                    id: task.task_id.clone(),
                }
            } else {
                backend(e)
            }
        })?;

        debug!(task_id = %task.task_id, title = %task.title, "Task created");
        Ok(task)
    }

    /// Fetch one task.
    pub async fn get_task(&self, task_id: &TaskId) -> SquadResult<Option<TaskDoc>> {
        self.collection
            .find_one(doc! { "taskId": task_id.to_string() }, None)
            .await
            .map_err(|e| backend(e).into())
    }

    /// Fetch one task or fail with NotFound.
    pub async fn require_task(&self, task_id: &TaskId) -> SquadResult<TaskDoc> {
        self.get_task(task_id).await?.ok_or_else(|| {
            StorageError::NotFound {
                entity: "task",
                id: task_id.to_string(),
            }
            .into()
        })
    }

    /// Assign a pending task to an agent. `assignedTo` is set exactly when
    /// the status leaves `pending`.
    pub async fn assign_task(&self, task_id: &TaskId, agent_id: &AgentId) -> SquadResult<TaskDoc> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let updated = self
            .collection
            .find_one_and_update(
                doc! { "taskId": task_id.to_string(), "status": TaskStatus::Pending.as_db_str() },
                doc! { "$set": {
                    "assignedTo": agent_id.to_string(),
                    "status": TaskStatus::Assigned.as_db_str(),
                    "updatedAt": mongodb::bson::DateTime::now(),
                } },
                options,
            )
            .await
            .map_err(backend)?;

        match updated {
            Some(task) => {
                debug!(task_id = %task.task_id, agent_id = %agent_id, "Task assigned");
                Ok(task)
            }
            None => {
                // Distinguish unknown task from a non-pending one.
                let task = self.require_task(task_id).await?;
                Err(TaskError::NotAssignable {
                    task_id: task_id.to_string(),
                    status: task.status,
                }
                .into())
            }
        }
    }

    /// Move a task along the status DAG, optionally recording a result.
    /// Rejects backward transitions and any change to a terminal task.
    pub async fn update_status(
        &self,
        task_id: &TaskId,
        new_status: TaskStatus,
        result: Option<String>,
    ) -> SquadResult<TaskDoc> {
        let current = self.require_task(task_id).await?;

        if current.status.is_terminal() {
            return Err(TaskError::Terminal {
                task_id: task_id.to_string(),
                status: current.status,
            }
            .into());
        }
        if !current.status.can_transition_to(new_status) {
            return Err(TaskError::InvalidTransition {
                task_id: task_id.to_string(),
                from: current.status,
                to: new_status,
            }
            .into());
        }

        let mut set = doc! {
            "status": new_status.as_db_str(),
            "updatedAt": mongodb::bson::DateTime::now(),
        };
        if let Some(result) = &result {
            set.insert("result", result);
        }

        // Filter on the observed status so a concurrent transition cannot
        // be overwritten backward.
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let updated = self
            .collection
            .find_one_and_update(
                doc! {
                    "taskId": task_id.to_string(),
                    "status": current.status.as_db_str(),
                },
                doc! { "$set": set },
                options,
            )
            .await
            .map_err(backend)?;

        match updated {
            Some(task) => {
                debug!(
                    task_id = %task.task_id,
                    from = %current.status,
                    to = %new_status,
                    "Task status updated"
                );
                Ok(task)
            }
            None => {
                let task = self.require_task(task_id).await?;
                Err(TaskError::InvalidTransition {
                    task_id: task_id.to_string(),
                    from: task.status,
                    to: new_status,
                }
                .into())
            }
        }
    }

    /// Transition any non-terminal task straight to `completed` with its
    /// result payload.
    pub async fn complete_task(
        &self,
        task_id: &TaskId,
        result: impl Into<String>,
    ) -> SquadResult<TaskDoc> {
        self.update_status(task_id, TaskStatus::Completed, Some(result.into()))
            .await
    }

    /// Transition any non-terminal task to `failed` with a reason.
    pub async fn fail_task(
        &self,
        task_id: &TaskId,
        reason: impl Into<String>,
    ) -> SquadResult<TaskDoc> {
        self.update_status(task_id, TaskStatus::Failed, Some(reason.into()))
            .await
    }

    /// Atomically claim an assigned (or still-pending) task for execution.
    ///
    /// Returns `None` when the task is no longer in a claimable state; the
    /// change-stream watcher uses this as the discriminator against double
    /// starts.
    pub async fn begin_work(&self, task_id: &TaskId) -> SquadResult<Option<TaskDoc>> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.collection
            .find_one_and_update(
                doc! {
                    "taskId": task_id.to_string(),
                    "status": { "$in": [
                        TaskStatus::Pending.as_db_str(),
                        TaskStatus::Assigned.as_db_str(),
                    ] },
                },
                doc! { "$set": {
                    "status": TaskStatus::InProgress.as_db_str(),
                    "updatedAt": mongodb::bson::DateTime::now(),
                } },
                options,
            )
            .await
            .map_err(|e| backend(e).into())
    }

    /// Every task assigned to an agent.
    pub async fn get_agent_tasks(&self, agent_id: &AgentId) -> SquadResult<Vec<TaskDoc>> {
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": 1 })
            .build();
        let cursor = self
            .collection
            .find(doc! { "assignedTo": agent_id.to_string() }, options)
            .await
            .map_err(backend)?;
        cursor.try_collect().await.map_err(|e| backend(e).into())
    }

    /// All tasks, newest first (REST index route).
    pub async fn list_tasks(&self) -> SquadResult<Vec<TaskDoc>> {
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": -1 })
            .build();
        let cursor = self
            .collection
            .find(doc! {}, options)
            .await
            .map_err(backend)?;
        cursor.try_collect().await.map_err(|e| backend(e).into())
    }
}
