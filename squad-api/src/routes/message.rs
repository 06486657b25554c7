//! Message read routes.

use crate::error::ApiResult;
use crate::state::AppState;
use crate::types::ListMessagesQuery;
use axum::{
    extract::{Query, State},
    Json,
};
use squad_store::MessageView;

/// Default page size for the message index.
const DEFAULT_LIMIT: i64 = 50;

/// GET /api/messages?limit=N - most recent messages across all agents.
pub async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<ListMessagesQuery>,
) -> ApiResult<Json<Vec<MessageView>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 500);
    let messages = state.store.messages().list_recent(limit).await?;
    Ok(Json(messages.into_iter().map(MessageView::from).collect()))
}
