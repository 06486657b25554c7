//! Agent lifecycle routes.

use crate::error::{ApiError, ApiResult};
use crate::events::ControlEvent;
use crate::state::AppState;
use crate::types::{
    AgentKilledResponse, AgentRestartedResponse, CreateAgentRequest, SubmitTaskRequest,
    TaskAssignedResponse,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use squad_core::{AgentId, AgentStatus, AgentType, TaskStatus};
use squad_store::{AgentView, RegisterAgent};
use tracing::{info, warn};

/// Maximum characters of task text carried into the task title.
const TITLE_CHARS: usize = 80;

fn parse_agent_id(raw: &str) -> ApiResult<AgentId> {
    raw.parse()
        .map_err(|_| ApiError::validation(format!("invalid agent id: {raw}")))
}

/// GET /api/agents - list all agents.
pub async fn list_agents(State(state): State<AppState>) -> ApiResult<Json<Vec<AgentView>>> {
    let agents = state.store.agents().list_agents(None, None).await?;
    Ok(Json(agents.into_iter().map(AgentView::from).collect()))
}

/// POST /api/agents - create a director or specialist record.
pub async fn create_agent(
    State(state): State<AppState>,
    Json(req): Json<CreateAgentRequest>,
) -> ApiResult<impl IntoResponse> {
    let parent_id = match (&req.agent_type, &req.parent_id) {
        (AgentType::Specialist, Some(raw)) => {
            let parent_id = parse_agent_id(raw)?;
            let parent = state
                .store
                .agents()
                .get_agent(&parent_id)
                .await?
                .ok_or_else(|| ApiError::not_found(format!("Agent {parent_id} not found")))?;
            if parent.agent_type != AgentType::Director {
                return Err(ApiError::validation("parentId must refer to a director"));
            }
            Some(parent_id)
        }
        (AgentType::Specialist, None) => {
            return Err(ApiError::validation("specialists require a parentId"));
        }
        (AgentType::Director, Some(_)) => {
            return Err(ApiError::validation("directors cannot have a parentId"));
        }
        (AgentType::Director, None) => None,
    };

    let agent = state
        .store
        .agents()
        .register_agent(RegisterAgent {
            agent_id: None,
            agent_type: req.agent_type,
            specialization: req.specialization,
            parent_id,
        })
        .await?;

    let view = AgentView::from(agent);
    state.ws.broadcast(ControlEvent::AgentCreated(view.clone()));
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/agents/:id/status - current agent snapshot.
pub async fn agent_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AgentView>> {
    let agent_id = parse_agent_id(&id)?;
    let agent = state
        .store
        .agents()
        .get_agent(&agent_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Agent {id} not found")))?;
    Ok(Json(AgentView::from(agent)))
}

/// POST /api/agents/:id/task - create and assign a task, then run the
/// agent's runtime asynchronously.
pub async fn submit_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SubmitTaskRequest>,
) -> ApiResult<Json<TaskAssignedResponse>> {
    if req.task.trim().is_empty() {
        return Err(ApiError::validation("task must not be empty"));
    }
    let agent_id = parse_agent_id(&id)?;
    let agent = state
        .store
        .agents()
        .require_agent(&agent_id)
        .await
        .map_err(ApiError::from)?;

    let title: String = req.task.chars().take(TITLE_CHARS).collect();
    let task = state
        .store
        .tasks()
        .create_task(title, req.task.clone(), None)
        .await?;
    state
        .ws
        .broadcast(ControlEvent::TaskCreated(task.clone().into()));

    let task_id = task
        .task_id
        .parse()
        .map_err(|_| ApiError::internal("task store returned a non-UUID id"))?;
    state.store.tasks().assign_task(&task_id, &agent_id).await?;
    state.ws.broadcast(ControlEvent::TaskStatus {
        task_id: task.task_id.clone(),
        status: TaskStatus::Assigned,
        result: None,
    });

    // The run happens in its own task; the response returns immediately.
    // Specialist assignments are started by the task watcher instead.
    if agent.agent_type == AgentType::Director {
        let run_state = state.clone();
        let task_text = req.task.clone();
        let task_id_string = task.task_id.clone();
        tokio::spawn(async move {
            info!(agent_id = %agent_id, task_id = %task_id_string, "Starting director run");
            run_state.ws.broadcast(ControlEvent::AgentStatus {
                agent_id: agent_id.to_string(),
                status: AgentStatus::Working.to_string(),
            });

            match run_state.runner.run_agent_task(&agent, &task_text).await {
                Ok(result) => {
                    if let Err(e) = run_state
                        .store
                        .tasks()
                        .complete_task(&task_id, result.clone())
                        .await
                    {
                        warn!(task_id = %task_id_string, error = %e, "Failed to complete root task");
                        return;
                    }
                    run_state.ws.broadcast(ControlEvent::TaskStatus {
                        task_id: task_id_string,
                        status: TaskStatus::Completed,
                        result: Some(result),
                    });
                }
                Err(e) => {
                    let reason = format!("Error: {e}");
                    if let Err(e) = run_state
                        .store
                        .tasks()
                        .fail_task(&task_id, reason.clone())
                        .await
                    {
                        warn!(task_id = %task_id_string, error = %e, "Failed to fail root task");
                        return;
                    }
                    run_state.ws.broadcast(ControlEvent::TaskStatus {
                        task_id: task_id_string,
                        status: TaskStatus::Failed,
                        result: Some(reason),
                    });
                }
            }
        });
    }

    Ok(Json(TaskAssignedResponse {
        task_id: task.task_id,
        status: "assigned",
        agent_id: agent_id.to_string(),
    }))
}

/// DELETE /api/agents/:id - kill the agent's process; the shared sandbox
/// stays alive for its peers. The in-flight task is left to the watcher.
pub async fn kill_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AgentKilledResponse>> {
    let agent_id = parse_agent_id(&id)?;
    state.store.agents().require_agent(&agent_id).await?;

    if let Some(orchestrator) = &state.orchestrator {
        if let Err(e) = orchestrator.kill(agent_id).await {
            warn!(agent_id = %agent_id, error = %e, "Orchestrator kill failed");
        }
    }
    state
        .store
        .agents()
        .update_status(&agent_id, AgentStatus::Completed, None)
        .await?;

    state.ws.broadcast(ControlEvent::AgentKilled {
        agent_id: agent_id.to_string(),
    });
    info!(agent_id = %agent_id, "Agent killed");

    Ok(Json(AgentKilledResponse {
        agent_id: agent_id.to_string(),
        status: "killed",
        checkpoint_id: None,
    }))
}

/// POST /api/agents/:id/restart - reset the agent to idle, preserving its
/// checkpoints and sandbox state. The next run resumes from the latest
/// checkpoint.
pub async fn restart_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let agent_id = parse_agent_id(&id)?;
    state
        .store
        .agents()
        .update_status(&agent_id, AgentStatus::Idle, None)
        .await?;

    state.ws.broadcast(ControlEvent::AgentStatus {
        agent_id: agent_id.to_string(),
        status: AgentStatus::Idle.to_string(),
    });
    info!(agent_id = %agent_id, "Agent restarted");

    Ok((
        StatusCode::CREATED,
        Json(AgentRestartedResponse {
            agent_id: agent_id.to_string(),
            status: "idle",
        }),
    ))
}
