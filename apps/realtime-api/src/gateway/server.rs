//! WebSocket upgrade handler and per-connection event loop.

use std::collections::HashSet;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio::time;

use crate::chat;
use crate::models::user::persist_presence;
use crate::AppState;

use super::events::{ClientEvent, EventName, ServerMessage};
use super::fanout::{BroadcastPayload, Scope};
use super::handler::{authenticate, ready_message, AuthenticatedSession};

/// Close codes (4000-range for application-level).
const CLOSE_UNKNOWN_ERROR: u16 = 4000;
const CLOSE_NOT_AUTHENTICATED: u16 = 4003;
const CLOSE_AUTH_FAILED: u16 = 4004;
const CLOSE_SESSION_TIMEOUT: u16 = 4009;

/// Interval at which clients are expected to heartbeat.
pub const HEARTBEAT_INTERVAL_MS: u64 = 41_250;

/// Timeout for receiving AUTHENTICATE after connection (seconds).
const AUTH_TIMEOUT_SECS: u64 = 10;

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Step 1: Wait for AUTHENTICATE within timeout. No other event is
    // accepted before the connection has an identity.
    let token_result = time::timeout(Duration::from_secs(AUTH_TIMEOUT_SECS), async {
        while let Some(msg) = ws_rx.next().await {
            let msg = match msg {
                Ok(m) => m,
                Err(e) => {
                    tracing::debug!(?e, "ws read error during authenticate");
                    return Err("read error");
                }
            };

            let text = match msg {
                Message::Text(t) => t,
                Message::Close(_) => return Err("client closed"),
                Message::Ping(_) | Message::Pong(_) => continue,
                _ => continue,
            };

            let event: ClientEvent = match serde_json::from_str(&text) {
                Ok(e) => e,
                Err(_) => {
                    let _ = send_close(&mut ws_tx, CLOSE_UNKNOWN_ERROR, "Invalid JSON").await;
                    return Err("invalid json");
                }
            };

            match event {
                ClientEvent::Authenticate { token } => return Ok(token),
                _ => {
                    let _ =
                        send_close(&mut ws_tx, CLOSE_NOT_AUTHENTICATED, "Expected authenticate")
                            .await;
                    return Err("expected authenticate");
                }
            }
        }
        Err("connection closed before authenticate")
    })
    .await;

    let token = match token_result {
        Ok(Ok(token)) => token,
        Ok(Err(reason)) => {
            tracing::debug!(%reason, "gateway handshake failed");
            return;
        }
        Err(_timeout) => {
            let _ = send_close(&mut ws_tx, CLOSE_SESSION_TIMEOUT, "Handshake timeout").await;
            return;
        }
    };

    // Step 2: validate the token and take the user's registry slot.
    let session = match authenticate(&state, &token) {
        Ok(session) => session,
        Err(reason) => {
            tracing::debug!(%reason, "gateway authentication failed");
            let _ = send_close(&mut ws_tx, CLOSE_AUTH_FAILED, reason).await;
            return;
        }
    };

    tracing::info!(
        user_id = %session.user_id,
        connection_id = %session.connection_id,
        "gateway session established"
    );

    // Subscribe before announcing so this session can't miss events raced
    // against its own handshake.
    let broadcast_rx = state.broadcast.subscribe();

    let ready_json = serde_json::to_string(&ready_message(&session)).unwrap();
    if ws_tx.send(Message::Text(ready_json.into())).await.is_err() {
        // A fresh session that dies here was never announced online, so
        // release its slot without a userOffline. A displaced reconnect was
        // announced by its predecessor and must still go offline.
        if session.displaced {
            cleanup_session(&state, &session);
        } else if state
            .registry
            .unregister(&session.user_id, &session.connection_id)
        {
            state.presence.clear(&session.user_id);
        }
        return;
    }

    // A displaced reconnect never went offline, so there is nothing to
    // announce or persist.
    if !session.displaced {
        state.broadcast.dispatch(
            BroadcastPayload::global(
                EventName::USER_ONLINE,
                serde_json::json!({ "userId": session.user_id }),
            )
            .skipping(&session.user_id),
        );

        let db = state.db.clone();
        let user_id = session.user_id.clone();
        tokio::spawn(async move {
            if let Err(e) = persist_presence(&db, &user_id, true).await {
                tracing::warn!(code = %e.code, %user_id, "failed to persist online presence");
            }
        });
    }

    run_session(&state, &session, ws_tx, ws_rx, broadcast_rx).await;

    cleanup_session(&state, &session);

    tracing::info!(
        user_id = %session.user_id,
        connection_id = %session.connection_id,
        "gateway session ended"
    );
}

/// Main session event loop: read client events, forward broadcasts that
/// match this session's scopes, enforce heartbeat.
async fn run_session(
    state: &AppState,
    session: &AuthenticatedSession,
    mut ws_tx: futures_util::stream::SplitSink<WebSocket, Message>,
    mut ws_rx: futures_util::stream::SplitStream<WebSocket>,
    mut broadcast_rx: broadcast::Receiver<std::sync::Arc<BroadcastPayload>>,
) {
    // Rooms this connection has joined. Local to the session — room
    // membership does not survive a reconnect.
    let mut joined_rooms: HashSet<String> = HashSet::new();

    // Heartbeat deadline: client must heartbeat within 1.5× the interval.
    let heartbeat_deadline = Duration::from_millis(HEARTBEAT_INTERVAL_MS * 3 / 2);
    let mut heartbeat_timer = time::interval(heartbeat_deadline);
    heartbeat_timer.tick().await; // First tick fires immediately; skip it.
    let mut got_heartbeat = true;

    loop {
        tokio::select! {
            // Client sends us an event.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let event: ClientEvent = match serde_json::from_str(&text) {
                            Ok(e) => e,
                            Err(_) => {
                                let _ = send_close(&mut ws_tx, CLOSE_UNKNOWN_ERROR, "Invalid JSON").await;
                                break;
                            }
                        };

                        got_heartbeat = true;
                        if !handle_client_event(state, session, event, &mut joined_rooms, &mut ws_tx).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, connection_id = %session.connection_id, "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            // Broadcast event from the fanout hub.
            result = broadcast_rx.recv() => {
                match result {
                    Ok(payload) => {
                        let wanted = match &payload.scope {
                            Scope::Global => true,
                            Scope::User(user_id) => *user_id == session.user_id,
                            Scope::Room(room_id) => joined_rooms.contains(room_id),
                        };
                        if !wanted
                            || payload.skip_user.as_deref() == Some(session.user_id.as_str())
                        {
                            continue;
                        }

                        let msg = ServerMessage::new(&payload.event_name, payload.data.clone());
                        let json = serde_json::to_string(&msg).unwrap();
                        if ws_tx.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(
                            connection_id = %session.connection_id,
                            skipped = n,
                            "gateway session lagged behind broadcast"
                        );
                        // Continue — we just drop the missed events.
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }

            // Heartbeat timeout check.
            _ = heartbeat_timer.tick() => {
                if !got_heartbeat {
                    tracing::debug!(
                        connection_id = %session.connection_id,
                        "heartbeat timeout — closing connection"
                    );
                    let _ = send_close(&mut ws_tx, CLOSE_SESSION_TIMEOUT, "Heartbeat timeout").await;
                    break;
                }
                got_heartbeat = false;
            }
        }
    }
}

/// Dispatch one client event. Returns false when the loop should end.
/// Operation failures are reported on this socket only and never tear the
/// connection down.
async fn handle_client_event(
    state: &AppState,
    session: &AuthenticatedSession,
    event: ClientEvent,
    joined_rooms: &mut HashSet<String>,
    ws_tx: &mut futures_util::stream::SplitSink<WebSocket, Message>,
) -> bool {
    match event {
        ClientEvent::Authenticate { .. } => {
            let _ = send_close(ws_tx, CLOSE_UNKNOWN_ERROR, "Already authenticated").await;
            return false;
        }

        ClientEvent::Heartbeat => {
            let ack = ServerMessage::new(EventName::HEARTBEAT_ACK, serde_json::json!({}));
            return send_event(ws_tx, &ack).await;
        }

        ClientEvent::JoinRoom { other_user_id } => {
            let room_id = chat::room::direct_room_id(&session.user_id, &other_user_id);
            joined_rooms.insert(room_id);
        }

        ClientEvent::SendMessage {
            receiver_id,
            content,
        } => {
            if let Err(e) = chat::send_message(state, &session.user_id, &receiver_id, &content).await
            {
                return send_event(ws_tx, &ServerMessage::error(&e.message)).await;
            }
        }

        ClientEvent::EditMessage {
            message_id,
            content,
        } => {
            if let Err(e) = chat::edit_message(state, message_id, &session.user_id, &content).await
            {
                return send_event(ws_tx, &ServerMessage::error(&e.message)).await;
            }
        }

        ClientEvent::DeleteMessage { message_id } => {
            if let Err(e) = chat::delete_message(state, message_id, &session.user_id).await {
                return send_event(ws_tx, &ServerMessage::error(&e.message)).await;
            }
        }

        ClientEvent::Typing {
            receiver_id,
            is_typing,
        } => {
            chat::typing(state, &session.user_id, &receiver_id, is_typing);
        }
    }

    true
}

/// Release the registry slot if this connection still owns it, then announce
/// and persist the user going offline. A displaced connection's slot already
/// belongs to its successor and must be left alone.
fn cleanup_session(state: &AppState, session: &AuthenticatedSession) {
    if !state
        .registry
        .unregister(&session.user_id, &session.connection_id)
    {
        return;
    }

    state.presence.clear(&session.user_id);

    state.broadcast.dispatch(
        BroadcastPayload::global(
            EventName::USER_OFFLINE,
            serde_json::json!({ "userId": session.user_id }),
        )
        .skipping(&session.user_id),
    );

    let db = state.db.clone();
    let user_id = session.user_id.clone();
    tokio::spawn(async move {
        if let Err(e) = persist_presence(&db, &user_id, false).await {
            tracing::warn!(code = %e.code, %user_id, "failed to persist offline presence");
        }
    });
}

async fn send_event(
    ws_tx: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> bool {
    let json = serde_json::to_string(msg).unwrap();
    ws_tx.send(Message::Text(json.into())).await.is_ok()
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(
    ws_tx: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    code: u16,
    reason: &str,
) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(axum::extract::ws::CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}
