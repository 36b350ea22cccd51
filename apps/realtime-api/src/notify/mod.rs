//! Notification fan-out: persist, then deliver on every channel that can
//! currently reach the user.
//!
//! The row insert is the only step that can fail the operation. Gateway
//! delivery and device push are best-effort: their failures are logged and
//! never reported to whoever created the notification.

pub mod kind;
pub mod push;

use chrono::Utc;
use diesel::prelude::*;
use diesel::result::OptionalExtension;
use studyhub_common::id::{prefix, prefixed_ulid};

use crate::db::schema::{notifications, push_subscriptions};
use crate::error::ApiError;
use crate::gateway::events::EventName;
use crate::gateway::fanout::BroadcastPayload;
use crate::models::notification::{NewNotification, Notification};
use crate::models::push_subscription::PushSubscription;
use crate::notify::kind::NotificationDraft;
use crate::notify::push::PushDelivery;
use crate::AppState;

/// Persist a notification and fan it out.
///
/// After the insert succeeds the notification exists regardless of delivery
/// outcome: a user with no live connection and no push subscription finds it
/// on their next notification list fetch.
pub async fn create(state: &AppState, draft: NotificationDraft) -> Result<Notification, ApiError> {
    let mut conn = state.db.get().await?;

    let id = prefixed_ulid(prefix::NOTIFICATION);
    let notification: Notification = diesel_async::RunQueryDsl::get_result(
        diesel::insert_into(notifications::table)
            .values(NewNotification {
                id: &id,
                user_id: &draft.user_id,
                kind: draft.kind.as_str(),
                title: &draft.title,
                message: &draft.message,
                priority: draft.priority.as_str(),
                action_url: draft.action_url.as_deref(),
                metadata: draft.metadata.as_ref(),
                created_at: Utc::now(),
            })
            .returning(Notification::as_returning()),
        &mut conn,
    )
    .await?;
    drop(conn);

    // Live gateway delivery: the generic event plus the kind-specific one,
    // but only when the user actually has a registered connection.
    if state.registry.lookup(&notification.user_id).is_some() {
        let data = serde_json::to_value(&notification).unwrap_or_default();
        state.broadcast.dispatch(BroadcastPayload::user(
            &notification.user_id,
            EventName::NEW_NOTIFICATION,
            data.clone(),
        ));
        state.broadcast.dispatch(BroadcastPayload::user(
            &notification.user_id,
            draft.kind.event_name(),
            data,
        ));
    }

    // Device push runs detached so notification creation never waits on an
    // external push service.
    let push_state = state.clone();
    let push_notification = notification.clone();
    tokio::spawn(async move {
        deliver_device_push(push_state, push_notification).await;
    });

    Ok(notification)
}

/// Look up the user's push subscription and attempt a device push.
async fn deliver_device_push(state: AppState, notification: Notification) {
    let subscription = match load_subscription(&state, &notification.user_id).await {
        Ok(Some(subscription)) => subscription,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(
                code = %e.code,
                user_id = %notification.user_id,
                "failed to load push subscription"
            );
            return;
        }
    };

    attempt_device_push(state.push.as_ref(), &subscription, &notification).await;
}

/// One push attempt against a known subscription. Failures are logged and
/// swallowed; the notification row is already durable.
pub async fn attempt_device_push(
    push: &dyn PushDelivery,
    subscription: &PushSubscription,
    notification: &Notification,
) {
    let payload = serde_json::json!({
        "title": notification.title,
        "message": notification.message,
        "actionUrl": notification.action_url,
    })
    .to_string();

    if let Err(e) = push.send(subscription, &payload).await {
        tracing::warn!(
            code = %e.code,
            user_id = %notification.user_id,
            notification_id = %notification.id,
            error = %e.message,
            "device push delivery failed"
        );
    }
}

async fn load_subscription(
    state: &AppState,
    user_id: &str,
) -> Result<Option<PushSubscription>, ApiError> {
    let mut conn = state.db.get().await?;
    let row = diesel_async::RunQueryDsl::get_result(
        push_subscriptions::table
            .find(user_id)
            .select(PushSubscription::as_select()),
        &mut conn,
    )
    .await
    .optional()?;
    Ok(row)
}

/// Mark one notification read. Returns None when the id doesn't exist or
/// belongs to someone else.
pub async fn mark_read(
    state: &AppState,
    notification_id: &str,
    user_id: &str,
) -> Result<Option<Notification>, ApiError> {
    let mut conn = state.db.get().await?;
    let updated = diesel_async::RunQueryDsl::get_result(
        diesel::update(
            notifications::table
                .filter(notifications::id.eq(notification_id))
                .filter(notifications::user_id.eq(user_id)),
        )
        .set(notifications::read.eq(true))
        .returning(Notification::as_returning()),
        &mut conn,
    )
    .await
    .optional()?;
    Ok(updated)
}

/// Mark every unread notification for the user as read. Returns the number
/// of rows touched.
pub async fn mark_all_read(state: &AppState, user_id: &str) -> Result<usize, ApiError> {
    let mut conn = state.db.get().await?;
    let count = diesel_async::RunQueryDsl::execute(
        diesel::update(
            notifications::table
                .filter(notifications::user_id.eq(user_id))
                .filter(notifications::read.eq(false)),
        )
        .set(notifications::read.eq(true)),
        &mut conn,
    )
    .await?;
    Ok(count)
}

/// Hard-delete all of the user's notifications.
pub async fn clear_all(state: &AppState, user_id: &str) -> Result<usize, ApiError> {
    let mut conn = state.db.get().await?;
    let count = diesel_async::RunQueryDsl::execute(
        diesel::delete(notifications::table.filter(notifications::user_id.eq(user_id))),
        &mut conn,
    )
    .await?;
    Ok(count)
}

/// Notifications for a user, newest first.
pub async fn list(
    state: &AppState,
    user_id: &str,
    unread_only: bool,
    limit: Option<i64>,
) -> Result<Vec<Notification>, ApiError> {
    let limit = limit.unwrap_or(50).clamp(1, 100);
    let mut conn = state.db.get().await?;

    let mut query = notifications::table
        .filter(notifications::user_id.eq(user_id))
        .into_boxed();
    if unread_only {
        query = query.filter(notifications::read.eq(false));
    }

    let rows: Vec<Notification> = diesel_async::RunQueryDsl::load(
        query
            .order(notifications::created_at.desc())
            .limit(limit)
            .select(Notification::as_select()),
        &mut conn,
    )
    .await?;

    Ok(rows)
}
