//! Push subscription registration.
//!
//! One subscription per user: registering from a new browser or device
//! replaces the previous endpoint wholesale, so device push always targets
//! the most recent registration.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::db::schema::push_subscriptions;
use crate::error::{ApiError, FieldError};
use crate::models::push_subscription::NewPushSubscription;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/push/subscribe", post(subscribe).delete(unsubscribe))
}

// ---------------------------------------------------------------------------
// POST /api/v1/push/subscribe
// ---------------------------------------------------------------------------

/// The browser `PushSubscription.toJSON()` shape.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubscribeRequest {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/push/subscribe",
    tag = "Push",
    request_body = SubscribeRequest,
    responses(
        (status = 204, description = "Subscription stored, replacing any prior one"),
        (status = 400, description = "Invalid subscription payload", body = crate::error::ApiErrorBody),
    ),
    security(("bearer" = [])),
)]
pub async fn subscribe(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<SubscribeRequest>,
) -> Result<StatusCode, ApiError> {
    let mut errors = Vec::new();
    if !body.endpoint.starts_with("https://") {
        errors.push(FieldError {
            field: "endpoint".to_string(),
            message: "Endpoint must be an https URL".to_string(),
        });
    }
    if body.keys.p256dh.is_empty() || body.keys.auth.is_empty() {
        errors.push(FieldError {
            field: "keys".to_string(),
            message: "p256dh and auth keys are required".to_string(),
        });
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let mut conn = state.db.get().await?;

    let row = NewPushSubscription {
        user_id: &user_id,
        endpoint: &body.endpoint,
        p256dh: &body.keys.p256dh,
        auth: &body.keys.auth,
        updated_at: Utc::now(),
    };

    diesel_async::RunQueryDsl::execute(
        diesel::insert_into(push_subscriptions::table)
            .values(&row)
            .on_conflict(push_subscriptions::user_id)
            .do_update()
            .set(&row),
        &mut conn,
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/push/subscribe
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/v1/push/subscribe",
    tag = "Push",
    responses(
        (status = 204, description = "Subscription removed (or none existed)"),
    ),
    security(("bearer" = [])),
)]
pub async fn unsubscribe(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let mut conn = state.db.get().await?;

    diesel_async::RunQueryDsl::execute(
        diesel::delete(push_subscriptions::table.find(&user_id)),
        &mut conn,
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
