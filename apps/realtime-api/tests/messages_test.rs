//! Persisted message invariants, run against the `_test` database
//! (`cargo run -p studyhub-realtime --bin realtime-migrate -- --test` first).
//!
//! Users are seeded with fresh ULID ids per test and removed afterwards, so
//! tests are independent and repeated runs leave nothing behind.

mod common;

use studyhub_common::id::prefixed_ulid;
use studyhub_realtime::chat;
use studyhub_realtime::models::message::Message;
use studyhub_realtime::AppState;

/// Load a message row directly, deleted or not.
async fn fetch_message(state: &AppState, id: i64) -> Message {
    use diesel::prelude::*;
    use studyhub_realtime::db::schema::messages;

    let mut conn = state.db.get().await.expect("pool");
    diesel_async::RunQueryDsl::get_result(
        messages::table.find(id).select(Message::as_select()),
        &mut conn,
    )
    .await
    .expect("fetch message")
}

#[tokio::test]
async fn second_delete_is_a_quiet_noop() {
    let state = common::db_state().await;
    let alice = prefixed_ulid("usr");
    let bob = prefixed_ulid("usr");
    common::seed_user(&state.db, &alice).await;
    common::seed_user(&state.db, &bob).await;

    let message = chat::send_message(&state, &alice, &bob, "hello")
        .await
        .expect("send");
    chat::delete_message(&state, message.id, &alice)
        .await
        .expect("first delete");

    let after_first = fetch_message(&state, message.id).await;
    assert!(after_first.is_deleted);
    assert!(after_first.deleted_at.is_some());

    // The second delete succeeds but changes nothing and broadcasts nothing.
    let mut rx = state.broadcast.subscribe();
    chat::delete_message(&state, message.id, &alice)
        .await
        .expect("second delete");

    assert!(rx.try_recv().is_err(), "no broadcast for a repeated delete");
    let after_second = fetch_message(&state, message.id).await;
    assert_eq!(after_first.deleted_at, after_second.deleted_at);

    common::cleanup_user(&state.db, &alice).await;
    common::cleanup_user(&state.db, &bob).await;
}

#[tokio::test]
async fn edit_cannot_land_on_a_deleted_message() {
    let state = common::db_state().await;
    let alice = prefixed_ulid("usr");
    let bob = prefixed_ulid("usr");
    common::seed_user(&state.db, &alice).await;
    common::seed_user(&state.db, &bob).await;

    let message = chat::send_message(&state, &alice, &bob, "original")
        .await
        .expect("send");
    chat::delete_message(&state, message.id, &alice)
        .await
        .expect("delete");

    let mut rx = state.broadcast.subscribe();
    let err = chat::edit_message(&state, message.id, &alice, "rewritten")
        .await
        .expect_err("editing a deleted message must fail");
    assert_eq!(err.code, "NOT_FOUND");

    // The row stays terminal and untouched, and nothing was broadcast.
    assert!(rx.try_recv().is_err(), "no broadcast for a rejected edit");
    let row = fetch_message(&state, message.id).await;
    assert!(row.is_deleted);
    assert_eq!(row.content, "original");
    assert!(!row.is_edited);

    common::cleanup_user(&state.db, &alice).await;
    common::cleanup_user(&state.db, &bob).await;
}

#[tokio::test]
async fn history_excludes_deleted_rows() {
    let state = common::db_state().await;
    let alice = prefixed_ulid("usr");
    let bob = prefixed_ulid("usr");
    common::seed_user(&state.db, &alice).await;
    common::seed_user(&state.db, &bob).await;

    let first = chat::send_message(&state, &alice, &bob, "one")
        .await
        .expect("send one");
    let second = chat::send_message(&state, &bob, &alice, "two")
        .await
        .expect("send two");
    let third = chat::send_message(&state, &alice, &bob, "three")
        .await
        .expect("send three");

    chat::delete_message(&state, second.id, &bob)
        .await
        .expect("delete");

    let history = chat::history(&state, &alice, &bob, None)
        .await
        .expect("history");
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|m| !m.is_deleted));
    // Newest first.
    assert_eq!(history[0].id, third.id);
    assert_eq!(history[1].id, first.id);

    common::cleanup_user(&state.db, &alice).await;
    common::cleanup_user(&state.db, &bob).await;
}

#[tokio::test]
async fn partners_are_deduplicated_and_recent_first() {
    let state = common::db_state().await;
    let alice = prefixed_ulid("usr");
    let bob = prefixed_ulid("usr");
    let carol = prefixed_ulid("usr");
    common::seed_user(&state.db, &alice).await;
    common::seed_user(&state.db, &bob).await;
    common::seed_user(&state.db, &carol).await;

    chat::send_message(&state, &alice, &bob, "to bob")
        .await
        .expect("send");
    chat::send_message(&state, &alice, &carol, "to carol")
        .await
        .expect("send");
    chat::send_message(&state, &bob, &alice, "reply")
        .await
        .expect("send");

    let partners = chat::list_partners(&state, &alice).await.expect("partners");
    assert_eq!(partners, vec![bob.clone(), carol.clone()]);

    common::cleanup_user(&state.db, &alice).await;
    common::cleanup_user(&state.db, &bob).await;
    common::cleanup_user(&state.db, &carol).await;
}
