//! Direct-message HTTP endpoints.
//!
//! The same service functions back the WebSocket events, so a message sent
//! over HTTP is relayed to live gateway sessions exactly like one sent over
//! the socket. The sender is always the authenticated user; it is never
//! read from the request body.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::chat;
use crate::error::ApiError;
use crate::models::message::Message;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/messages", post(send_message))
        .route(
            "/messages/{message_id}",
            axum::routing::patch(edit_message).delete(delete_message),
        )
        .route("/conversations", get(list_conversations))
        .route(
            "/conversations/{other_user_id}/messages",
            get(message_history),
        )
}

// ---------------------------------------------------------------------------
// POST /api/v1/messages
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub receiver_id: String,
    pub content: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/messages",
    tag = "Messages",
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message stored and relayed", body = Message),
        (status = 400, description = "Invalid content or receiver", body = crate::error::ApiErrorBody),
    ),
    security(("bearer" = [])),
)]
pub async fn send_message(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let message = chat::send_message(&state, &user_id, &body.receiver_id, &body.content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/conversations/{other_user_id}/messages
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/conversations/{other_user_id}/messages",
    tag = "Messages",
    params(
        ("other_user_id" = String, Path, description = "The other participant"),
        ("limit" = Option<i64>, Query, description = "Max messages to return (1-100, default 50)"),
    ),
    responses(
        (status = 200, description = "Messages with this user, newest first", body = Vec<Message>),
    ),
    security(("bearer" = [])),
)]
pub async fn message_history(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(other_user_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let messages = chat::history(&state, &user_id, &other_user_id, params.limit).await?;
    Ok(Json(messages))
}

// ---------------------------------------------------------------------------
// PATCH /api/v1/messages/{message_id}
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct EditMessageRequest {
    pub content: String,
}

#[utoipa::path(
    patch,
    path = "/api/v1/messages/{message_id}",
    tag = "Messages",
    params(("message_id" = i64, Path, description = "Message to edit")),
    request_body = EditMessageRequest,
    responses(
        (status = 200, description = "Edited message", body = Message),
        (status = 403, description = "Not the sender", body = crate::error::ApiErrorBody),
        (status = 404, description = "Message not found", body = crate::error::ApiErrorBody),
        (status = 409, description = "Edit window expired", body = crate::error::ApiErrorBody),
    ),
    security(("bearer" = [])),
)]
pub async fn edit_message(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Json(body): Json<EditMessageRequest>,
) -> Result<Json<Message>, ApiError> {
    let message = chat::edit_message(&state, message_id, &user_id, &body.content).await?;
    Ok(Json(message))
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/messages/{message_id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/v1/messages/{message_id}",
    tag = "Messages",
    params(("message_id" = i64, Path, description = "Message to delete")),
    responses(
        (status = 204, description = "Message deleted (or already was)"),
        (status = 403, description = "Not the sender", body = crate::error::ApiErrorBody),
        (status = 404, description = "Message not found", body = crate::error::ApiErrorBody),
    ),
    security(("bearer" = [])),
)]
pub async fn delete_message(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    chat::delete_message(&state, message_id, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// GET /api/v1/conversations
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/conversations",
    tag = "Messages",
    responses(
        (status = 200, description = "User ids of conversation partners, most recent first", body = Vec<String>),
    ),
    security(("bearer" = [])),
)]
pub async fn list_conversations(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, ApiError> {
    let partners = chat::list_partners(&state, &user_id).await?;
    Ok(Json(partners))
}
