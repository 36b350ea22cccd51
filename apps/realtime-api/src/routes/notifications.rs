//! Notification endpoints: creation (internal services and tooling) and the
//! read/cleanup surface used by clients.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::error::ApiError;
use crate::models::notification::Notification;
use crate::notify;
use crate::notify::kind::NotificationDraft;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/notifications",
            get(list_notifications)
                .post(create_notification)
                .delete(clear_notifications),
        )
        .route("/notifications/{notification_id}/read", post(mark_read))
        .route("/notifications/read-all", post(mark_all_read))
}

// ---------------------------------------------------------------------------
// POST /api/v1/notifications
// ---------------------------------------------------------------------------

/// Creation requests name a kind; the per-kind fields feed that kind's
/// template and priority rule. An unknown kind fails deserialization.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CreateNotificationRequest {
    #[serde(rename_all = "camelCase")]
    AssignmentDueSoon {
        user_id: String,
        assignment_title: String,
        course_name: String,
        hours_remaining: i64,
    },
    #[serde(rename_all = "camelCase")]
    StudySessionStarting {
        user_id: String,
        session_title: String,
        starts_in_minutes: i64,
    },
    #[serde(rename_all = "camelCase")]
    AchievementUnlocked {
        user_id: String,
        achievement_name: String,
    },
    #[serde(rename_all = "camelCase")]
    NewMessage {
        user_id: String,
        sender_id: String,
        content: String,
    },
    #[serde(rename_all = "camelCase")]
    CourseUpdate {
        user_id: String,
        course_name: String,
        summary: String,
    },
}

impl CreateNotificationRequest {
    fn into_draft(self) -> NotificationDraft {
        match self {
            Self::AssignmentDueSoon {
                user_id,
                assignment_title,
                course_name,
                hours_remaining,
            } => NotificationDraft::assignment_due(
                &user_id,
                &assignment_title,
                &course_name,
                hours_remaining,
            ),
            Self::StudySessionStarting {
                user_id,
                session_title,
                starts_in_minutes,
            } => NotificationDraft::study_session_starting(&user_id, &session_title, starts_in_minutes),
            Self::AchievementUnlocked {
                user_id,
                achievement_name,
            } => NotificationDraft::achievement_unlocked(&user_id, &achievement_name),
            Self::NewMessage {
                user_id,
                sender_id,
                content,
            } => NotificationDraft::new_message(&user_id, &sender_id, &content),
            Self::CourseUpdate {
                user_id,
                course_name,
                summary,
            } => NotificationDraft::course_update(&user_id, &course_name, &summary),
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications",
    tag = "Notifications",
    request_body = CreateNotificationRequest,
    responses(
        (status = 201, description = "Notification stored and fan-out started", body = Notification),
        (status = 400, description = "Unknown kind or missing fields", body = crate::error::ApiErrorBody),
    ),
    security(("bearer" = [])),
)]
pub async fn create_notification(
    AuthUser { user_id: _ }: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<Notification>), ApiError> {
    let notification = notify::create(&state, body.into_draft()).await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ListNotificationsParams {
    pub unread: Option<bool>,
    pub limit: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    tag = "Notifications",
    params(
        ("unread" = Option<bool>, Query, description = "Only unread notifications"),
        ("limit" = Option<i64>, Query, description = "Max notifications to return (1-100, default 50)"),
    ),
    responses(
        (status = 200, description = "Notifications, newest first", body = Vec<Notification>),
    ),
    security(("bearer" = [])),
)]
pub async fn list_notifications(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<ListNotificationsParams>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let notifications = notify::list(
        &state,
        &user_id,
        params.unread.unwrap_or(false),
        params.limit,
    )
    .await?;
    Ok(Json(notifications))
}

// ---------------------------------------------------------------------------
// POST /api/v1/notifications/{notification_id}/read
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/notifications/{notification_id}/read",
    tag = "Notifications",
    params(("notification_id" = String, Path, description = "Notification to mark read")),
    responses(
        (status = 200, description = "Updated notification", body = Notification),
        (status = 404, description = "Not found or not yours", body = crate::error::ApiErrorBody),
    ),
    security(("bearer" = [])),
)]
pub async fn mark_read(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(notification_id): Path<String>,
) -> Result<Json<Notification>, ApiError> {
    let notification = notify::mark_read(&state, &notification_id, &user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification not found"))?;
    Ok(Json(notification))
}

// ---------------------------------------------------------------------------
// POST /api/v1/notifications/read-all
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkUpdateResponse {
    pub updated: usize,
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/read-all",
    tag = "Notifications",
    responses(
        (status = 200, description = "Count of notifications marked read", body = BulkUpdateResponse),
    ),
    security(("bearer" = [])),
)]
pub async fn mark_all_read(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<BulkUpdateResponse>, ApiError> {
    let updated = notify::mark_all_read(&state, &user_id).await?;
    Ok(Json(BulkUpdateResponse { updated }))
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/notifications
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/v1/notifications",
    tag = "Notifications",
    responses(
        (status = 204, description = "All of the user's notifications removed"),
    ),
    security(("bearer" = [])),
)]
pub async fn clear_notifications(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    notify::clear_all(&state, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
