//! # API Handlers
//!
//! JSON endpoints over the dashboard operations. Listing endpoints that accept
//! `refresh` ingest first and then read; a failed refresh is logged and the
//! already persisted data is still returned.

use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::db;
use crate::error::ApiError;
use crate::models::{ServiceInfo, message};
use crate::server::AppState;

pub mod messages;
pub mod queues;
pub mod refresh;
pub mod topics;

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
}

/// Store health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Store reachable", body = HealthResponse),
        (status = 500, description = "Store unreachable", body = ApiError)
    ),
    tag = "root"
)]
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    db::health_check(&state.db).await?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}

/// `?refresh=` toggle for listing endpoints.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct RefreshQuery {
    /// Ingest before reading
    pub refresh: Option<bool>,
}

/// A stored message as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageInfo {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: String,
    /// Identifier assigned by the queue service
    pub message_id: String,
    #[schema(example = "orders")]
    pub queue_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<serde_json::Value>,
    #[schema(example = "RECEIVED")]
    pub state: String,
    #[schema(example = "2026-10-01T09:00:00+00:00")]
    pub received_at: String,
}

impl From<message::Model> for MessageInfo {
    fn from(model: message::Model) -> Self {
        Self {
            id: model.id.to_string(),
            message_id: model.message_id,
            queue_name: model.queue_name,
            topic_arn: model.topic_arn,
            subject: model.subject,
            body: model.body,
            attributes: model.attributes,
            state: model.state,
            received_at: model.received_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessagesResponse {
    pub messages: Vec<MessageInfo>,
}

impl MessagesResponse {
    pub(crate) fn from_models(models: Vec<message::Model>) -> Self {
        Self {
            messages: models.into_iter().map(MessageInfo::from).collect(),
        }
    }
}
