//! Broadcast hub for dispatching events to connected sessions.
//!
//! Uses a single `tokio::sync::broadcast` channel. Each connected session
//! subscribes and filters events locally by scope: global, a single user,
//! or a direct-message room the session has explicitly joined. Dispatch
//! order is delivery order, which is what gives a room its in-order
//! guarantee on a single process.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;

/// Capacity of the broadcast channel. Slow receivers that fall behind will
/// skip messages (RecvError::Lagged).
const BROADCAST_CAPACITY: usize = 4096;

/// Who should receive a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every connected session.
    Global,
    /// Only sessions authenticated as this user.
    User(String),
    /// Only sessions that have joined this room.
    Room(String),
}

/// A payload broadcast to connected gateway sessions.
#[derive(Debug, Clone)]
pub struct BroadcastPayload {
    pub scope: Scope,
    /// The event name on the wire (e.g. "newMessage").
    pub event_name: String,
    /// Serialized event data.
    pub data: Value,
    /// Session user to skip even when the scope matches (used so a user
    /// doesn't receive their own online/offline announcement).
    pub skip_user: Option<String>,
}

impl BroadcastPayload {
    pub fn global(event_name: &str, data: Value) -> Self {
        Self {
            scope: Scope::Global,
            event_name: event_name.to_string(),
            data,
            skip_user: None,
        }
    }

    pub fn user(user_id: &str, event_name: &str, data: Value) -> Self {
        Self {
            scope: Scope::User(user_id.to_string()),
            event_name: event_name.to_string(),
            data,
            skip_user: None,
        }
    }

    pub fn room(room_id: &str, event_name: &str, data: Value) -> Self {
        Self {
            scope: Scope::Room(room_id.to_string()),
            event_name: event_name.to_string(),
            data,
            skip_user: None,
        }
    }

    pub fn skipping(mut self, user_id: &str) -> Self {
        self.skip_user = Some(user_id.to_string());
        self
    }
}

/// The global broadcast hub. Cloneable — store in AppState.
#[derive(Clone)]
pub struct GatewayBroadcast {
    sender: broadcast::Sender<Arc<BroadcastPayload>>,
}

impl GatewayBroadcast {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { sender }
    }

    /// Subscribe to the broadcast channel. Each gateway session should call
    /// this once to get its own receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<BroadcastPayload>> {
        self.sender.subscribe()
    }

    /// Dispatch an event to all connected sessions.
    pub fn dispatch(&self, payload: BroadcastPayload) {
        // send() returns Err if there are no receivers — that's fine.
        let _ = self.sender.send(Arc::new(payload));
    }
}

impl Default for GatewayBroadcast {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatch_reaches_subscriber() {
        let hub = GatewayBroadcast::new();
        let mut rx = hub.subscribe();

        hub.dispatch(BroadcastPayload::room(
            "dm:a:b",
            "newMessage",
            serde_json::json!({"content": "hi"}),
        ));

        let payload = rx.recv().await.unwrap();
        assert_eq!(payload.scope, Scope::Room("dm:a:b".to_string()));
        assert_eq!(payload.event_name, "newMessage");
        assert_eq!(payload.data["content"], "hi");
    }

    #[tokio::test]
    async fn dispatch_without_subscribers_does_not_panic() {
        let hub = GatewayBroadcast::new();
        hub.dispatch(BroadcastPayload::global("userOnline", serde_json::json!({})));
    }

    #[tokio::test]
    async fn payloads_arrive_in_dispatch_order() {
        let hub = GatewayBroadcast::new();
        let mut rx = hub.subscribe();

        for i in 0..10 {
            hub.dispatch(BroadcastPayload::room(
                "dm:a:b",
                "newMessage",
                serde_json::json!({ "i": i }),
            ));
        }

        for i in 0..10 {
            let payload = rx.recv().await.unwrap();
            assert_eq!(payload.data["i"], i);
        }
    }

    #[test]
    fn skipping_sets_skip_user() {
        let payload =
            BroadcastPayload::global("userOnline", serde_json::json!({})).skipping("u1");
        assert_eq!(payload.skip_user.as_deref(), Some("u1"));
    }
}
