//! The tool catalogue exposed to the LLM and its store-backed executor.
//!
//! Tool results are JSON. The inbox tool only ever returns 50-character
//! previews; the model must spend a `readMessage` call for full content.

use crate::types::ToolDefinition;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use squad_core::{
    AgentError, AgentId, AgentStatus, AgentType, CheckpointSummary, MessageType, ResumePointer,
    Specialization, SquadResult, StorageError, TaskId, ValidationError,
};
use squad_store::{AgentView, MessageView, RegisterAgent, Store, TaskView};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Observer invoked after every tool execution with
/// `(tool_name, input, result)`. The API layer uses this to emit WebSocket
/// events for tool activity.
pub type ToolObserver = Arc<dyn Fn(&str, &Value, &Value) + Send + Sync>;

/// Something that can execute a named tool against a JSON input.
///
/// The agentic loop only knows this trait; tests drive it with scripted
/// handlers, production uses [`ToolExecutor`].
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, name: &str, input: &Value) -> SquadResult<Value>;

    /// Notification of the run's cumulative token total after each loop
    /// turn. Default is a no-op.
    fn on_usage(&self, _cumulative_tokens: i64) {}
}

/// Tool schemas offered to an agent. Directors additionally get
/// `spawnSpecialist`.
pub fn tool_catalogue(agent_type: AgentType) -> Vec<ToolDefinition> {
    let mut tools = vec![
        tool(
            "checkInbox",
            "List unread message notifications: metadata plus a 50-character preview. \
             Use readMessage to fetch full content.",
            json!({
                "type": "object",
                "properties": {
                    "limit": { "type": "integer", "description": "Maximum previews to return (default 10)" }
                }
            }),
        ),
        tool(
            "readMessage",
            "Fetch the full content of one message and mark it read.",
            json!({
                "type": "object",
                "properties": {
                    "messageId": { "type": "string", "description": "Id of the message to read" }
                },
                "required": ["messageId"]
            }),
        ),
        tool(
            "sendMessage",
            "Send a message to another agent.",
            json!({
                "type": "object",
                "properties": {
                    "toAgentId": { "type": "string" },
                    "content": { "type": "string" },
                    "type": {
                        "type": "string",
                        "enum": ["task", "result", "status", "error"]
                    }
                },
                "required": ["toAgentId", "content", "type"]
            }),
        ),
        tool(
            "checkpoint",
            "Record a progress checkpoint so work can resume after a restart.",
            json!({
                "type": "object",
                "properties": {
                    "summary": {
                        "type": "object",
                        "properties": {
                            "goal": { "type": "string" },
                            "completed": { "type": "array", "items": { "type": "string" } },
                            "pending": { "type": "array", "items": { "type": "string" } },
                            "decisions": { "type": "array", "items": { "type": "string" } }
                        },
                        "required": ["goal"]
                    },
                    "resumePointer": {
                        "type": "object",
                        "properties": {
                            "nextAction": { "type": "string" },
                            "phase": { "type": "string" },
                            "currentContext": { "type": "string" }
                        },
                        "required": ["nextAction", "phase"]
                    }
                },
                "required": ["summary", "resumePointer"]
            }),
        ),
        tool(
            "createTask",
            "Create a new pending task.",
            json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "description": { "type": "string" },
                    "parentTaskId": { "type": "string" }
                },
                "required": ["title", "description"]
            }),
        ),
        tool(
            "assignTask",
            "Assign a pending task to an agent.",
            json!({
                "type": "object",
                "properties": {
                    "taskId": { "type": "string" },
                    "agentId": { "type": "string" }
                },
                "required": ["taskId", "agentId"]
            }),
        ),
        tool(
            "completeTask",
            "Mark a task completed with its result.",
            json!({
                "type": "object",
                "properties": {
                    "taskId": { "type": "string" },
                    "result": { "type": "string" }
                },
                "required": ["taskId", "result"]
            }),
        ),
        tool(
            "getTaskStatus",
            "Fetch the current snapshot of a task.",
            json!({
                "type": "object",
                "properties": {
                    "taskId": { "type": "string" }
                },
                "required": ["taskId"]
            }),
        ),
        tool(
            "listAgents",
            "List available agents (idle, working, or waiting), optionally filtered.",
            json!({
                "type": "object",
                "properties": {
                    "type": { "type": "string", "enum": ["director", "specialist"] },
                    "status": {
                        "type": "string",
                        "enum": ["idle", "working", "waiting"]
                    }
                }
            }),
        ),
    ];

    if agent_type == AgentType::Director {
        tools.push(tool(
            "spawnSpecialist",
            "Create a new specialist agent record. The control plane starts its \
             process once a task is assigned to it.",
            json!({
                "type": "object",
                "properties": {
                    "specialization": {
                        "type": "string",
                        "enum": ["researcher", "writer", "analyst", "general"]
                    }
                },
                "required": ["specialization"]
            }),
        ));
    }

    tools
}

fn tool(name: &str, description: &str, input_schema: Value) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

// ============================================================================
// EXECUTOR
// ============================================================================

/// Store-backed tool executor bound to one agent.
pub struct ToolExecutor {
    store: Store,
    agent_id: AgentId,
    agent_type: AgentType,
    observer: Option<ToolObserver>,
    /// Running token total, recorded into checkpoints written by the
    /// `checkpoint` tool. Advanced by the agentic loop after each turn.
    tokens_used: AtomicI64,
}

impl ToolExecutor {
    pub fn new(store: Store, agent_id: AgentId, agent_type: AgentType) -> Self {
        Self {
            store,
            agent_id,
            agent_type,
            observer: None,
            tokens_used: AtomicI64::new(0),
        }
    }

    /// Attach a tool observer.
    pub fn with_observer(mut self, observer: ToolObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The agent this executor acts as.
    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    /// Record the cumulative token count for subsequent checkpoints.
    pub fn set_tokens_used(&self, total: i64) {
        self.tokens_used.store(total, Ordering::Relaxed);
    }

    fn observe(&self, name: &str, input: &Value, result: &Value) {
        if let Some(observer) = &self.observer {
            observer(name, input, result);
        }
    }

    async fn dispatch(&self, name: &str, input: &Value) -> SquadResult<Value> {
        match name {
            "checkInbox" => self.check_inbox(input).await,
            "readMessage" => self.read_message(input).await,
            "sendMessage" => self.send_message(input).await,
            "checkpoint" => self.checkpoint(input).await,
            "createTask" => self.create_task(input).await,
            "assignTask" => self.assign_task(input).await,
            "completeTask" => self.complete_task(input).await,
            "getTaskStatus" => self.get_task_status(input).await,
            "listAgents" => self.list_agents(input).await,
            "spawnSpecialist" => self.spawn_specialist(input).await,
            other => Err(ValidationError::InvalidValue {
                field: "tool".to_string(),
                reason: format!("unknown tool: {other}"),
            }
            .into()),
        }
    }

    async fn check_inbox(&self, input: &Value) -> SquadResult<Value> {
        #[derive(Deserialize)]
        struct Input {
            limit: Option<i64>,
        }
        let input: Input = parse_input(input)?;
        let messages = self.store.messages();
        let previews = messages
            .check_inbox_previews(&self.agent_id, input.limit)
            .await?;
        let unread = messages.count_unread(&self.agent_id).await?;
        Ok(json!({ "messages": previews, "unreadCount": unread }))
    }

    async fn read_message(&self, input: &Value) -> SquadResult<Value> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Input {
            message_id: String,
        }
        let input: Input = parse_input(input)?;
        let message_id = parse_id(&input.message_id, "messageId")?;
        let message = self
            .store
            .messages()
            .read_message(&message_id)
            .await?
            .ok_or(StorageError::NotFound {
                entity: "message",
                id: input.message_id.clone(),
            })?;
        Ok(serde_json::to_value(MessageView::from(message)).unwrap_or_default())
    }

    async fn send_message(&self, input: &Value) -> SquadResult<Value> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Input {
            to_agent_id: String,
            content: String,
            #[serde(rename = "type")]
            message_type: MessageType,
        }
        let input: Input = parse_input(input)?;
        let to_agent = parse_id(&input.to_agent_id, "toAgentId")?;
        let message = self
            .store
            .messages()
            .send_message(
                &self.agent_id,
                &to_agent,
                input.content,
                input.message_type,
                None,
                None,
            )
            .await?;
        Ok(json!({ "messageId": message.message_id, "threadId": message.thread_id }))
    }

    async fn checkpoint(&self, input: &Value) -> SquadResult<Value> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Input {
            summary: CheckpointSummary,
            resume_pointer: ResumePointer,
        }
        let input: Input = parse_input(input)?;
        let phase = input.resume_pointer.phase.clone();
        let checkpoint = self
            .store
            .checkpoints()
            .create_checkpoint(
                &self.agent_id,
                input.summary,
                input.resume_pointer,
                self.tokens_used.load(Ordering::Relaxed),
            )
            .await?;
        Ok(json!({ "checkpointId": checkpoint.checkpoint_id, "phase": phase }))
    }

    async fn create_task(&self, input: &Value) -> SquadResult<Value> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Input {
            title: String,
            description: String,
            parent_task_id: Option<String>,
        }
        let input: Input = parse_input(input)?;
        let parent = input
            .parent_task_id
            .as_deref()
            .map(|id| parse_id::<TaskId>(id, "parentTaskId"))
            .transpose()?;
        let task = self
            .store
            .tasks()
            .create_task(input.title, input.description, parent)
            .await?;
        Ok(json!({ "taskId": task.task_id, "status": task.status }))
    }

    async fn assign_task(&self, input: &Value) -> SquadResult<Value> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Input {
            task_id: String,
            agent_id: String,
        }
        let input: Input = parse_input(input)?;
        let task_id = parse_id(&input.task_id, "taskId")?;
        let agent_id = parse_id(&input.agent_id, "agentId")?;
        let task = self.store.tasks().assign_task(&task_id, &agent_id).await?;
        Ok(json!({
            "taskId": task.task_id,
            "assignedTo": task.assigned_to,
            "status": task.status,
        }))
    }

    async fn complete_task(&self, input: &Value) -> SquadResult<Value> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Input {
            task_id: String,
            result: String,
        }
        let input: Input = parse_input(input)?;
        let task_id = parse_id(&input.task_id, "taskId")?;
        let task = self
            .store
            .tasks()
            .complete_task(&task_id, input.result)
            .await?;
        Ok(json!({ "taskId": task.task_id, "status": task.status }))
    }

    async fn get_task_status(&self, input: &Value) -> SquadResult<Value> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Input {
            task_id: String,
        }
        let input: Input = parse_input(input)?;
        let task_id = parse_id(&input.task_id, "taskId")?;
        let task = self.store.tasks().require_task(&task_id).await?;
        Ok(serde_json::to_value(TaskView::from(task)).unwrap_or_default())
    }

    async fn list_agents(&self, input: &Value) -> SquadResult<Value> {
        #[derive(Deserialize)]
        struct Input {
            #[serde(rename = "type")]
            agent_type: Option<AgentType>,
            status: Option<AgentStatus>,
        }
        let input: Input = parse_input(input)?;
        let agents = self
            .store
            .agents()
            .list_agents(input.agent_type, input.status)
            .await?;
        // The tool only ever surfaces agents that can still take work.
        let agents: Vec<AgentView> = agents
            .into_iter()
            .filter(|a| a.status.is_available())
            .map(AgentView::from)
            .collect();
        Ok(json!({ "agents": agents }))
    }

    async fn spawn_specialist(&self, input: &Value) -> SquadResult<Value> {
        if self.agent_type != AgentType::Director {
            return Err(AgentError::SpawnNotAllowed {
                agent_id: self.agent_id.to_string(),
            }
            .into());
        }

        #[derive(Deserialize)]
        struct Input {
            specialization: Specialization,
        }
        let input: Input = parse_input(input)?;
        let specialist = self
            .store
            .agents()
            .register_agent(RegisterAgent::specialist(
                input.specialization,
                self.agent_id,
            ))
            .await?;
        debug!(
            specialist = %specialist.agent_id,
            specialization = %input.specialization,
            "Specialist record spawned"
        );
        Ok(json!({
            "agentId": specialist.agent_id,
            "specialization": specialist.specialization,
        }))
    }
}

#[async_trait]
impl ToolHandler for ToolExecutor {
    async fn handle(&self, name: &str, input: &Value) -> SquadResult<Value> {
        let result = self.dispatch(name, input).await;
        match &result {
            Ok(value) => self.observe(name, input, value),
            Err(e) => {
                let error_value = json!({ "error": e.to_string() });
                self.observe(name, input, &error_value);
            }
        }
        result
    }

    fn on_usage(&self, cumulative_tokens: i64) {
        self.set_tokens_used(cumulative_tokens);
    }
}

fn parse_input<T: serde::de::DeserializeOwned>(input: &Value) -> SquadResult<T> {
    serde_json::from_value(input.clone()).map_err(|e| {
        ValidationError::InvalidValue {
            field: "input".to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

fn parse_id<T: squad_core::EntityIdType>(raw: &str, field: &str) -> SquadResult<T> {
    raw.parse::<T>().map_err(|_| {
        ValidationError::InvalidValue {
            field: field.to_string(),
            reason: format!("not a UUID: {raw}"),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_sizes() {
        let specialist = tool_catalogue(AgentType::Specialist);
        let director = tool_catalogue(AgentType::Director);
        assert_eq!(specialist.len(), 9);
        assert_eq!(director.len(), 10);
        assert!(director.iter().any(|t| t.name == "spawnSpecialist"));
        assert!(!specialist.iter().any(|t| t.name == "spawnSpecialist"));
    }

    #[test]
    fn test_catalogue_schemas_are_objects() {
        for tool in tool_catalogue(AgentType::Director) {
            assert_eq!(
                tool.input_schema["type"], "object",
                "tool {} must take an object input",
                tool.name
            );
            assert!(!tool.description.is_empty());
        }
    }
}
