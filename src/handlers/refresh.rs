//! Explicit refresh endpoints.

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::ingest::RefreshSummary;
use crate::server::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct TopicRefreshResponse {
    pub topic_arn: String,
    /// Messages received across the topic's queues, duplicates included
    pub messages_received: usize,
}

/// Ingest from every queue
#[utoipa::path(
    post,
    path = "/refresh",
    responses(
        (status = 200, description = "Refresh completed", body = RefreshSummary),
        (status = 502, description = "Queue service error", body = ApiError)
    ),
    tag = "refresh"
)]
pub async fn refresh_all(State(state): State<AppState>) -> Result<Json<RefreshSummary>, ApiError> {
    let summary = state.dashboard.trigger_full_refresh().await?;
    Ok(Json(summary))
}

/// Ingest from the queues subscribed to a topic
#[utoipa::path(
    post,
    path = "/topics/{arn}/refresh",
    params(("arn" = String, Path, description = "Topic ARN, URL-encoded")),
    responses(
        (status = 200, description = "Refresh completed", body = TopicRefreshResponse),
        (status = 502, description = "Pub/sub service error", body = ApiError)
    ),
    tag = "refresh"
)]
pub async fn refresh_topic(
    State(state): State<AppState>,
    Path(arn): Path<String>,
) -> Result<Json<TopicRefreshResponse>, ApiError> {
    let messages_received = state.dashboard.refresh_topic(&arn).await?;
    Ok(Json(TopicRefreshResponse {
        topic_arn: arn,
        messages_received,
    }))
}
