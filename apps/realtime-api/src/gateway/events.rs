//! Gateway wire format: client events, server events, and event names.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// A message received from the client over WebSocket, e.g.
/// `{"event": "typing", "data": {"receiverId": "usr_2", "isTyping": true}}`.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Must be the first event on a connection.
    #[serde(rename_all = "camelCase")]
    Authenticate { token: String },

    /// Subscribe this connection to the direct-message room shared with
    /// another user. Both participants join independently.
    #[serde(rename_all = "camelCase")]
    JoinRoom { other_user_id: String },

    #[serde(rename_all = "camelCase")]
    SendMessage { receiver_id: String, content: String },

    #[serde(rename_all = "camelCase")]
    Typing {
        receiver_id: String,
        is_typing: bool,
    },

    #[serde(rename_all = "camelCase")]
    EditMessage { message_id: i64, content: String },

    #[serde(rename_all = "camelCase")]
    DeleteMessage { message_id: i64 },

    Heartbeat,
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// A message sent from the server to the client over WebSocket.
#[derive(Debug, Clone, Serialize)]
pub struct ServerMessage {
    pub event: String,
    pub data: Value,
}

impl ServerMessage {
    pub fn new(event: &str, data: Value) -> Self {
        Self {
            event: event.to_string(),
            data,
        }
    }

    /// Build an `error` event for a failure on this connection only.
    pub fn error(message: &str) -> Self {
        Self::new(EventName::ERROR, serde_json::json!({ "message": message }))
    }
}

/// Event names emitted to clients.
pub struct EventName;

impl EventName {
    pub const READY: &'static str = "ready";
    pub const HEARTBEAT_ACK: &'static str = "heartbeatAck";
    pub const USER_ONLINE: &'static str = "userOnline";
    pub const USER_OFFLINE: &'static str = "userOffline";
    pub const NEW_MESSAGE: &'static str = "newMessage";
    pub const MESSAGE_EDITED: &'static str = "messageEdited";
    pub const MESSAGE_DELETED: &'static str = "messageDeleted";
    pub const USER_TYPING: &'static str = "userTyping";
    pub const ERROR: &'static str = "error";
    pub const NEW_NOTIFICATION: &'static str = "new-notification";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ClientEvent {
        serde_json::from_str(json).expect("parse client event")
    }

    #[test]
    fn parses_authenticate() {
        let event = parse(r#"{"event":"authenticate","data":{"token":"abc"}}"#);
        assert!(matches!(event, ClientEvent::Authenticate { token } if token == "abc"));
    }

    #[test]
    fn parses_join_room() {
        let event = parse(r#"{"event":"joinRoom","data":{"otherUserId":"usr_2"}}"#);
        assert!(matches!(event, ClientEvent::JoinRoom { other_user_id } if other_user_id == "usr_2"));
    }

    #[test]
    fn parses_send_message() {
        let event =
            parse(r#"{"event":"sendMessage","data":{"receiverId":"usr_2","content":"hi"}}"#);
        match event {
            ClientEvent::SendMessage {
                receiver_id,
                content,
            } => {
                assert_eq!(receiver_id, "usr_2");
                assert_eq!(content, "hi");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn parses_typing() {
        let event = parse(r#"{"event":"typing","data":{"receiverId":"usr_2","isTyping":true}}"#);
        match event {
            ClientEvent::Typing {
                receiver_id,
                is_typing,
            } => {
                assert_eq!(receiver_id, "usr_2");
                assert!(is_typing);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn parses_edit_and_delete() {
        let event = parse(r#"{"event":"editMessage","data":{"messageId":42,"content":"fixed"}}"#);
        assert!(matches!(event, ClientEvent::EditMessage { message_id, .. } if message_id == 42));

        let event = parse(r#"{"event":"deleteMessage","data":{"messageId":42}}"#);
        assert!(matches!(event, ClientEvent::DeleteMessage { message_id } if message_id == 42));
    }

    #[test]
    fn parses_heartbeat_without_data() {
        let event = parse(r#"{"event":"heartbeat"}"#);
        assert!(matches!(event, ClientEvent::Heartbeat));
    }

    #[test]
    fn unknown_event_is_rejected() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"event":"selfDestruct"}"#).is_err());
    }

    #[test]
    fn server_message_serializes_event_and_data() {
        let msg = ServerMessage::new(
            EventName::USER_TYPING,
            serde_json::json!({"userId": "usr_1", "isTyping": true}),
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["event"], "userTyping");
        assert_eq!(json["data"]["userId"], "usr_1");
    }

    #[test]
    fn error_event_carries_message() {
        let msg = ServerMessage::error("cannot edit");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["data"]["message"], "cannot edit");
    }
}
