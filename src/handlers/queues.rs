//! Queue listing endpoints.

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use super::{MessagesResponse, RefreshQuery};
use crate::dashboard::QueueSummary;
use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct QueuesResponse {
    pub queues: Vec<QueueSummary>,
}

/// List queues with their stored message counts
#[utoipa::path(
    get,
    path = "/queues",
    params(RefreshQuery),
    responses(
        (status = 200, description = "Queues listed", body = QueuesResponse),
        (status = 502, description = "Queue service error", body = ApiError)
    ),
    tag = "queues"
)]
pub async fn list_queues(
    State(state): State<AppState>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<QueuesResponse>, ApiError> {
    if query.refresh.unwrap_or(false)
        && let Err(err) = state.dashboard.trigger_full_refresh().await
    {
        warn!(error = %err, "Refresh before listing queues failed");
    }

    let queues = state.dashboard.list_queues_with_counts().await?;
    Ok(Json(QueuesResponse { queues }))
}

/// Messages received from a queue, newest first
#[utoipa::path(
    get,
    path = "/queues/{name}/messages",
    params(("name" = String, Path, description = "Short queue name")),
    responses(
        (status = 200, description = "Messages listed", body = MessagesResponse)
    ),
    tag = "queues"
)]
pub async fn list_queue_messages(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let messages = state.dashboard.list_messages_for_queue(&name).await?;
    Ok(Json(MessagesResponse::from_models(messages)))
}
