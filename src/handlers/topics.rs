//! Topic listing endpoints.
//!
//! Both endpoints refresh by default before reading.

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use super::{MessagesResponse, RefreshQuery};
use crate::dashboard::TopicSummary;
use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct TopicsResponse {
    pub topics: Vec<TopicSummary>,
}

/// List topics with their stored message counts
#[utoipa::path(
    get,
    path = "/topics",
    params(RefreshQuery),
    responses(
        (status = 200, description = "Topics listed", body = TopicsResponse),
        (status = 502, description = "Pub/sub service error", body = ApiError)
    ),
    tag = "topics"
)]
pub async fn list_topics(
    State(state): State<AppState>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<TopicsResponse>, ApiError> {
    if query.refresh.unwrap_or(true)
        && let Err(err) = state.dashboard.trigger_full_refresh().await
    {
        warn!(error = %err, "Refresh before listing topics failed");
    }

    let topics = state.dashboard.list_topics_with_counts().await?;
    Ok(Json(TopicsResponse { topics }))
}

/// Messages published through a topic, newest first
#[utoipa::path(
    get,
    path = "/topics/{arn}/messages",
    params(
        ("arn" = String, Path, description = "Topic ARN, URL-encoded"),
        RefreshQuery
    ),
    responses(
        (status = 200, description = "Messages listed", body = MessagesResponse)
    ),
    tag = "topics"
)]
pub async fn list_topic_messages(
    State(state): State<AppState>,
    Path(arn): Path<String>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<MessagesResponse>, ApiError> {
    if query.refresh.unwrap_or(true)
        && let Err(err) = state.dashboard.refresh_topic(&arn).await
    {
        warn!(topic_arn = %arn, error = %err, "Refresh before listing topic messages failed");
    }

    let messages = state.dashboard.list_messages_for_topic(&arn).await?;
    Ok(Json(MessagesResponse::from_models(messages)))
}
