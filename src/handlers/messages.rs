//! Message detail endpoint.

use axum::{
    extract::{Path, State},
    response::Json,
};
use uuid::Uuid;

use super::MessageInfo;
use crate::error::{ApiError, not_found};
use crate::server::AppState;

/// Fetch one stored message by id
#[utoipa::path(
    get,
    path = "/messages/{id}",
    params(("id" = Uuid, Path, description = "Stored message id")),
    responses(
        (status = 200, description = "Message found", body = MessageInfo),
        (status = 404, description = "No such message", body = ApiError)
    ),
    tag = "messages"
)]
pub async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageInfo>, ApiError> {
    let message = state
        .dashboard
        .message_detail(id)
        .await?
        .ok_or_else(|| not_found(&format!("Message {id}")))?;

    Ok(Json(message.into()))
}
