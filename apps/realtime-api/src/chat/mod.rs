//! Direct-messaging service: persist-then-relay between exactly two users.
//!
//! Every mutation persists first; only after the row is durable is anything
//! relayed to live connections. Relay is best-effort — a message nobody is
//! connected to hear is still stored and shows up on the next history fetch.

pub mod room;

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel::result::OptionalExtension;

use crate::db::schema::messages;
use crate::error::{ApiError, FieldError};
use crate::gateway::events::EventName;
use crate::gateway::fanout::BroadcastPayload;
use crate::models::message::{Message, MessageEdit, NewMessage};
use crate::notify;
use crate::notify::kind::NotificationDraft;
use crate::AppState;

/// Messages are editable for this long after creation. Measured from
/// `created_at`, never from a prior edit, so repeated small edits cannot
/// extend the window.
pub const EDIT_WINDOW_MINUTES: i64 = 15;

const MAX_CONTENT_LEN: usize = 4000;

/// How many recent rows `list_partners` scans. Partners whose last exchange
/// is older than this window fall off the list.
const PARTNER_SCAN_LIMIT: i64 = 1000;

/// Whether `created_at` is still within the edit window at `now`.
pub fn within_edit_window(created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - created_at <= Duration::minutes(EDIT_WINDOW_MINUTES)
}

/// Ownership and liveness checks shared by edit and delete. A soft-deleted
/// message is indistinguishable from an absent one.
pub fn authorize_mutation(message: &Message, user_id: &str) -> Result<(), ApiError> {
    if message.is_deleted {
        return Err(ApiError::not_found("Message not found"));
    }
    if message.sender_id != user_id {
        return Err(ApiError::forbidden("You can only modify your own messages"));
    }
    Ok(())
}

fn validate_content(content: &str) -> Result<&str, ApiError> {
    let content = content.trim();
    let mut errors = Vec::new();
    if content.is_empty() {
        errors.push(FieldError {
            field: "content".to_string(),
            message: "Message content is required".to_string(),
        });
    } else if content.chars().count() > MAX_CONTENT_LEN {
        errors.push(FieldError {
            field: "content".to_string(),
            message: "Message content must be 4000 characters or fewer".to_string(),
        });
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }
    Ok(content)
}

/// Persist a message, then relay it to the pair's room and fan out a
/// notification to the receiver. Insert failure aborts the whole operation;
/// nothing is relayed for a message that isn't durable.
pub async fn send_message(
    state: &AppState,
    sender_id: &str,
    receiver_id: &str,
    content: &str,
) -> Result<Message, ApiError> {
    let content = validate_content(content)?;

    if sender_id == receiver_id {
        return Err(ApiError::bad_request("Cannot message yourself"));
    }

    let mut conn = state.db.get().await?;

    let message: Message = diesel_async::RunQueryDsl::get_result(
        diesel::insert_into(messages::table)
            .values(NewMessage {
                id: state.snowflake.generate(),
                sender_id,
                receiver_id,
                content,
                created_at: Utc::now(),
            })
            .returning(Message::as_returning()),
        &mut conn,
    )
    .await?;
    drop(conn);

    // Durable — now relay to whoever joined the pair's room.
    let room_id = room::direct_room_id(sender_id, receiver_id);
    state.broadcast.dispatch(BroadcastPayload::room(
        &room_id,
        EventName::NEW_MESSAGE,
        serde_json::to_value(&message).unwrap_or_default(),
    ));

    // Best-effort notification fan-out to the receiver.
    let draft = NotificationDraft::new_message(receiver_id, sender_id, &message.content);
    if let Err(e) = notify::create(state, draft).await {
        tracing::warn!(
            code = %e.code,
            receiver_id,
            "message notification fan-out failed"
        );
    }

    Ok(message)
}

/// Edit a message's content within the 15-minute window. The updated row is
/// broadcast globally so any currently rendering view reconciles the edit.
pub async fn edit_message(
    state: &AppState,
    message_id: i64,
    user_id: &str,
    content: &str,
) -> Result<Message, ApiError> {
    let content = validate_content(content)?;

    let mut conn = state.db.get().await?;

    let message: Message = diesel_async::RunQueryDsl::get_result(
        messages::table
            .find(message_id)
            .select(Message::as_select()),
        &mut conn,
    )
    .await
    .optional()?
    .ok_or_else(|| ApiError::not_found("Message not found"))?;

    authorize_mutation(&message, user_id)?;

    let now = Utc::now();
    if !within_edit_window(message.created_at, now) {
        return Err(ApiError::policy_violation("Edit window has expired"));
    }

    // The update itself re-checks liveness: a delete that lands between the
    // load above and this statement matches zero rows, so an edit can never
    // resurrect or broadcast a deleted message.
    let updated: Message = diesel_async::RunQueryDsl::get_result(
        diesel::update(
            messages::table
                .find(message_id)
                .filter(messages::is_deleted.eq(false)),
        )
        .set(MessageEdit {
            content: content.to_string(),
            is_edited: true,
            edited_at: now,
        })
        .returning(Message::as_returning()),
        &mut conn,
    )
    .await
    .optional()?
    .ok_or_else(|| ApiError::not_found("Message not found"))?;
    drop(conn);

    state.broadcast.dispatch(BroadcastPayload::global(
        EventName::MESSAGE_EDITED,
        serde_json::to_value(&updated).unwrap_or_default(),
    ));

    Ok(updated)
}

/// Soft-delete a message. Idempotent: deleting an already-deleted message
/// succeeds without effect or broadcast.
pub async fn delete_message(state: &AppState, message_id: i64, user_id: &str) -> Result<(), ApiError> {
    let mut conn = state.db.get().await?;

    let message: Message = diesel_async::RunQueryDsl::get_result(
        messages::table
            .find(message_id)
            .select(Message::as_select()),
        &mut conn,
    )
    .await
    .optional()?
    .ok_or_else(|| ApiError::not_found("Message not found"))?;

    if message.sender_id != user_id {
        return Err(ApiError::forbidden("You can only modify your own messages"));
    }

    if message.is_deleted {
        return Ok(());
    }

    // Guarded like the edit: only a live row is updated, so concurrent
    // deletes race to a single transition and a single broadcast.
    let deleted = diesel_async::RunQueryDsl::execute(
        diesel::update(
            messages::table
                .find(message_id)
                .filter(messages::is_deleted.eq(false)),
        )
        .set((
            messages::is_deleted.eq(true),
            messages::deleted_at.eq(Utc::now()),
        )),
        &mut conn,
    )
    .await?;
    drop(conn);

    if deleted == 0 {
        return Ok(());
    }

    state.broadcast.dispatch(BroadcastPayload::global(
        EventName::MESSAGE_DELETED,
        serde_json::json!({ "messageId": message_id }),
    ));

    Ok(())
}

/// Record a typing assertion and relay it to the receiver's live
/// connection, if there is one. The sender's presence is updated whether or
/// not the receiver is reachable.
pub fn typing(state: &AppState, sender_id: &str, receiver_id: &str, is_typing: bool) {
    state.presence.set_typing(sender_id, receiver_id, is_typing);

    if state.registry.lookup(receiver_id).is_some() {
        state.broadcast.dispatch(BroadcastPayload::user(
            receiver_id,
            EventName::USER_TYPING,
            serde_json::json!({
                "userId": sender_id,
                "isTyping": is_typing,
            }),
        ));
    }
}

/// Messages between a pair in either direction, newest first, soft-deleted
/// rows excluded. Callers reverse for chronological display.
pub async fn history(
    state: &AppState,
    user_id: &str,
    other_user_id: &str,
    limit: Option<i64>,
) -> Result<Vec<Message>, ApiError> {
    let limit = limit.unwrap_or(50).clamp(1, 100);
    let mut conn = state.db.get().await?;

    let rows: Vec<Message> = diesel_async::RunQueryDsl::load(
        messages::table
            .filter(
                messages::sender_id
                    .eq(user_id)
                    .and(messages::receiver_id.eq(other_user_id))
                    .or(messages::sender_id
                        .eq(other_user_id)
                        .and(messages::receiver_id.eq(user_id))),
            )
            .filter(messages::is_deleted.eq(false))
            .order(messages::id.desc())
            .limit(limit)
            .select(Message::as_select()),
        &mut conn,
    )
    .await?;

    Ok(rows)
}

/// Distinct conversational partners, most recently active first, derived
/// from a bounded scan of the user's most recent messages.
pub async fn list_partners(state: &AppState, user_id: &str) -> Result<Vec<String>, ApiError> {
    let mut conn = state.db.get().await?;

    let pairs: Vec<(String, String)> = diesel_async::RunQueryDsl::load(
        messages::table
            .filter(
                messages::sender_id
                    .eq(user_id)
                    .or(messages::receiver_id.eq(user_id)),
            )
            .order(messages::id.desc())
            .limit(PARTNER_SCAN_LIMIT)
            .select((messages::sender_id, messages::receiver_id)),
        &mut conn,
    )
    .await?;

    let mut partners = Vec::new();
    for (sender, receiver) in pairs {
        let other = if sender == user_id { receiver } else { sender };
        if !partners.contains(&other) {
            partners.push(other);
        }
    }

    Ok(partners)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sender: &str, created_at: DateTime<Utc>) -> Message {
        Message {
            id: 1,
            sender_id: sender.to_string(),
            receiver_id: "usr_b".to_string(),
            content: "hi".to_string(),
            is_edited: false,
            edited_at: None,
            is_deleted: false,
            deleted_at: None,
            created_at,
        }
    }

    #[test]
    fn edit_window_open_just_before_fifteen_minutes() {
        let created = Utc::now();
        let now = created + Duration::minutes(14) + Duration::seconds(59);
        assert!(within_edit_window(created, now));
    }

    #[test]
    fn edit_window_closed_just_after_fifteen_minutes() {
        let created = Utc::now();
        let now = created + Duration::minutes(15) + Duration::seconds(1);
        assert!(!within_edit_window(created, now));
    }

    #[test]
    fn edit_window_open_at_exact_boundary() {
        let created = Utc::now();
        assert!(within_edit_window(created, created + Duration::minutes(15)));
    }

    #[test]
    fn owner_may_mutate_live_message() {
        let msg = message("usr_a", Utc::now());
        assert!(authorize_mutation(&msg, "usr_a").is_ok());
    }

    #[test]
    fn non_owner_is_forbidden() {
        let msg = message("usr_a", Utc::now());
        let err = authorize_mutation(&msg, "usr_b").unwrap_err();
        assert_eq!(err.code, "FORBIDDEN");
    }

    #[test]
    fn deleted_message_reads_as_not_found() {
        let mut msg = message("usr_a", Utc::now());
        msg.is_deleted = true;
        let err = authorize_mutation(&msg, "usr_a").unwrap_err();
        assert_eq!(err.code, "NOT_FOUND");
    }

    #[test]
    fn content_validation_rejects_empty_and_oversized() {
        assert!(validate_content("  ").is_err());
        assert!(validate_content(&"x".repeat(4001)).is_err());
        assert_eq!(validate_content(" hi ").unwrap(), "hi");
    }

    #[test]
    fn content_limit_counts_characters_not_bytes() {
        // 4000 two-byte characters are within the limit.
        let multibyte = "é".repeat(4000);
        assert_eq!(validate_content(&multibyte).unwrap(), multibyte);
        assert!(validate_content(&"é".repeat(4001)).is_err());
    }
}
