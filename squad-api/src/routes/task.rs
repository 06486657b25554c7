//! Task read routes. Mutation happens through the agent routes and the
//! director's tools.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use squad_core::TaskId;
use squad_store::TaskView;

/// GET /api/tasks - all tasks, newest first.
pub async fn list_tasks(State(state): State<AppState>) -> ApiResult<Json<Vec<TaskView>>> {
    let tasks = state.store.tasks().list_tasks().await?;
    Ok(Json(tasks.into_iter().map(TaskView::from).collect()))
}

/// GET /api/tasks/:id - one task.
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TaskView>> {
    let task_id: TaskId = id
        .parse()
        .map_err(|_| ApiError::validation(format!("invalid task id: {id}")))?;
    let task = state
        .store
        .tasks()
        .get_task(&task_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Task {id} not found")))?;
    Ok(Json(TaskView::from(task)))
}
