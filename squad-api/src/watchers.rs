//! Change-stream watchers driving reactive behavior.
//!
//! Three MongoDB change streams feed the control plane: task assignments
//! start specialist runs, message inserts and checkpoint inserts fan out as
//! events. Specialist starts happen in their own task so a watcher callback
//! never blocks on an LLM call.

use crate::events::ControlEvent;
use crate::runs::AgentRunner;
use crate::ws::WsState;
use futures_util::StreamExt;
use mongodb::bson::doc;
use mongodb::change_stream::event::ChangeStreamEvent;
use mongodb::options::{ChangeStreamOptions, FullDocumentType};
use squad_core::{AgentId, AgentType, TaskId, TaskStatus};
use squad_store::{preview_of, CheckpointDoc, MessageDoc, Store, TaskDoc, CHECKPOINTS, MESSAGES, TASKS};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Delay before re-opening a broken change stream.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// The control plane's three change-stream watchers.
pub struct Watchers {
    store: Store,
    ws: Arc<WsState>,
    runner: Arc<AgentRunner>,
    /// Tasks currently being started; the in-memory double-start guard.
    starting: Mutex<HashSet<String>>,
}

impl Watchers {
    pub fn new(store: Store, ws: Arc<WsState>, runner: Arc<AgentRunner>) -> Self {
        Self {
            store,
            ws,
            runner,
            starting: Mutex::new(HashSet::new()),
        }
    }

    /// Spawn all three watcher loops.
    pub fn spawn_all(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(self.clone().watch_tasks()),
            tokio::spawn(self.clone().watch_messages()),
            tokio::spawn(self.watch_checkpoints()),
        ]
    }

    // ========================================================================
    // TASKS
    // ========================================================================

    async fn watch_tasks(self: Arc<Self>) {
        let pipeline = vec![doc! { "$match": {
            "operationType": { "$in": ["insert", "update", "replace"] },
            "fullDocument.assignedTo": { "$ne": null },
            "fullDocument.status": { "$in": ["pending", "assigned"] },
        } }];
        let options = ChangeStreamOptions::builder()
            .full_document(Some(FullDocumentType::UpdateLookup))
            .build();

        loop {
            let stream = self
                .store
                .database()
                .collection::<TaskDoc>(TASKS)
                .watch(pipeline.clone(), options.clone())
                .await;

            match stream {
                Ok(mut stream) => {
                    info!("Task change stream open");
                    while let Some(event) = stream.next().await {
                        match event {
                            Ok(event) => self.clone().on_task_event(event).await,
                            Err(e) => {
                                warn!(error = %e, "Task change stream error");
                                break;
                            }
                        }
                    }
                }
                Err(e) => error!(error = %e, "Failed to open task change stream"),
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    async fn on_task_event(self: Arc<Self>, event: ChangeStreamEvent<TaskDoc>) {
        let Some(task) = event.full_document else {
            return;
        };
        let Some(assignee_raw) = task.assigned_to.clone() else {
            return;
        };
        let (Ok(agent_id), Ok(task_id)) = (
            assignee_raw.parse::<AgentId>(),
            task.task_id.parse::<TaskId>(),
        ) else {
            warn!(task_id = %task.task_id, "Task change carries malformed ids");
            return;
        };

        let agent = match self.store.agents().get_agent(&agent_id).await {
            Ok(Some(agent)) => agent,
            Ok(None) => {
                warn!(agent_id = %agent_id, "Assignee not found");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Assignee lookup failed");
                return;
            }
        };

        // Only specialists with a parent director are auto-started.
        if agent.agent_type != AgentType::Specialist || agent.parent_id.is_none() {
            return;
        }
        if self.runner.is_running(&agent_id).await {
            debug!(agent_id = %agent_id, "Specialist already running");
            return;
        }

        // Double-start guard: check-then-set under the mutex.
        {
            let mut starting = self.starting.lock().await;
            if !starting.insert(task.task_id.clone()) {
                debug!(task_id = %task.task_id, "Start already in flight");
                return;
            }
        }

        // The actual start runs in its own task; the watcher loop moves on.
        let watchers = self.clone();
        tokio::spawn(async move {
            watchers.start_specialist(agent, agent_id, task_id, task).await;
            watchers.starting.lock().await.remove(&task_id.to_string());
        });
    }

    async fn start_specialist(
        &self,
        agent: squad_store::AgentDoc,
        agent_id: AgentId,
        task_id: TaskId,
        task: TaskDoc,
    ) {
        // The in_progress transition is the second discriminator: a task
        // that already left {pending, assigned} is someone else's start.
        let claimed = match self.store.tasks().begin_work(&task_id).await {
            Ok(Some(claimed)) => claimed,
            Ok(None) => {
                debug!(task_id = %task_id, "Task no longer claimable");
                return;
            }
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Failed to claim task");
                return;
            }
        };
        self.ws.broadcast(ControlEvent::TaskStatus {
            task_id: claimed.task_id.clone(),
            status: TaskStatus::InProgress,
            result: None,
        });
        info!(agent_id = %agent_id, task_id = %task_id, "Starting specialist");

        let task_text = format!("{}\n\n{}", task.title, task.description);
        match self.runner.run_agent_task(&agent, &task_text).await {
            Ok(result) => {
                match self.store.tasks().complete_task(&task_id, result.clone()).await {
                    Ok(_) => {
                        self.ws.broadcast(ControlEvent::TaskStatus {
                            task_id: task_id.to_string(),
                            status: TaskStatus::Completed,
                            result: Some(result),
                        });
                    }
                    Err(e) => warn!(task_id = %task_id, error = %e, "Failed to complete task"),
                }
            }
            Err(e) => {
                let reason = format!("Error: {e}");
                match self.store.tasks().fail_task(&task_id, reason.clone()).await {
                    Ok(_) => {
                        self.ws.broadcast(ControlEvent::TaskStatus {
                            task_id: task_id.to_string(),
                            status: TaskStatus::Failed,
                            result: Some(reason),
                        });
                    }
                    Err(e) => warn!(task_id = %task_id, error = %e, "Failed to fail task"),
                }
            }
        }
    }

    // ========================================================================
    // MESSAGES
    // ========================================================================

    async fn watch_messages(self: Arc<Self>) {
        let pipeline = vec![doc! { "$match": { "operationType": "insert" } }];
        let options = ChangeStreamOptions::builder()
            .full_document(Some(FullDocumentType::UpdateLookup))
            .build();

        loop {
            let stream = self
                .store
                .database()
                .collection::<MessageDoc>(MESSAGES)
                .watch(pipeline.clone(), options.clone())
                .await;

            match stream {
                Ok(mut stream) => {
                    info!("Message change stream open");
                    while let Some(event) = stream.next().await {
                        match event {
                            Ok(event) => {
                                if let Some(message) = event.full_document {
                                    self.ws.broadcast(ControlEvent::MessageNew {
                                        message_id: message.message_id,
                                        from_agent: message.from_agent,
                                        to_agent: message.to_agent,
                                        message_type: message.message_type.to_string(),
                                        preview: preview_of(&message.content),
                                    });
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "Message change stream error");
                                break;
                            }
                        }
                    }
                }
                Err(e) => error!(error = %e, "Failed to open message change stream"),
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    // ========================================================================
    // CHECKPOINTS
    // ========================================================================

    async fn watch_checkpoints(self: Arc<Self>) {
        let pipeline = vec![doc! { "$match": { "operationType": "insert" } }];
        let options = ChangeStreamOptions::builder()
            .full_document(Some(FullDocumentType::UpdateLookup))
            .build();

        loop {
            let stream = self
                .store
                .database()
                .collection::<CheckpointDoc>(CHECKPOINTS)
                .watch(pipeline.clone(), options.clone())
                .await;

            match stream {
                Ok(mut stream) => {
                    info!("Checkpoint change stream open");
                    while let Some(event) = stream.next().await {
                        match event {
                            Ok(event) => {
                                if let Some(checkpoint) = event.full_document {
                                    self.ws.broadcast(ControlEvent::CheckpointNew {
                                        checkpoint_id: checkpoint.checkpoint_id,
                                        agent_id: checkpoint.agent_id,
                                        phase: checkpoint.resume_pointer.phase,
                                        timestamp: checkpoint.created_at,
                                    });
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "Checkpoint change stream error");
                                break;
                            }
                        }
                    }
                }
                Err(e) => error!(error = %e, "Failed to open checkpoint change stream"),
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }
}
