//! Gateway handshake: token validation and registry insertion.

use studyhub_common::id::{prefix, prefixed_ulid};

use crate::auth::tokens::validate_access_token;
use crate::gateway::events::{EventName, ServerMessage};
use crate::gateway::registry::ConnectionHandle;
use crate::gateway::server::HEARTBEAT_INTERVAL_MS;
use crate::AppState;

/// A connection that has completed authentication.
pub struct AuthenticatedSession {
    pub user_id: String,
    pub connection_id: String,
    /// Whether this connection displaced a prior one for the same user. A
    /// displacement must not announce `userOnline` again — the user never
    /// went offline.
    pub displaced: bool,
}

/// Validate the handshake token and register the connection. The token is
/// checked here even if the client already authenticated over HTTP: the
/// WebSocket is a separate channel and asserts identity independently.
pub fn authenticate(state: &AppState, token: &str) -> Result<AuthenticatedSession, &'static str> {
    let claims = match validate_access_token(&state.config.token_secret, token) {
        Ok(claims) => claims,
        Err(_) => return Err("Authentication failed"),
    };

    let connection_id = prefixed_ulid(prefix::CONNECTION);
    let displaced = state
        .registry
        .register(&claims.sub, ConnectionHandle::new(connection_id.clone()));

    if let Some(prior) = &displaced {
        tracing::info!(
            user_id = %claims.sub,
            old_connection_id = %prior.connection_id,
            new_connection_id = %connection_id,
            "connection displaced"
        );
    }

    Ok(AuthenticatedSession {
        user_id: claims.sub,
        connection_id,
        displaced: displaced.is_some(),
    })
}

/// The `ready` event acknowledging a successful handshake.
pub fn ready_message(session: &AuthenticatedSession) -> ServerMessage {
    ServerMessage::new(
        EventName::READY,
        serde_json::json!({
            "userId": session.user_id,
            "heartbeatIntervalMs": HEARTBEAT_INTERVAL_MS,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::auth::tokens::mint_access_token;
    use crate::config::Config;
    use crate::gateway::fanout::GatewayBroadcast;
    use crate::gateway::presence::PresenceTracker;
    use crate::gateway::registry::InMemoryRegistry;
    use crate::notify::push::WebPushClient;

    async fn test_state() -> AppState {
        let config = Config {
            database_url: "postgres://127.0.0.1:1/unused".to_string(),
            token_secret: "test-secret".to_string(),
            port: 0,
            vapid_public_key: None,
            vapid_private_key_pem: None,
            vapid_subject: "mailto:test@example.com".to_string(),
            typing_timeout_secs: 10,
        };
        let push = WebPushClient::from_config(&config);
        AppState {
            db: crate::db::pool::connect(&config.database_url).await,
            config: Arc::new(config),
            snowflake: Arc::new(studyhub_common::SnowflakeGenerator::new(0)),
            registry: Arc::new(InMemoryRegistry::new()),
            presence: Arc::new(PresenceTracker::new()),
            broadcast: Arc::new(GatewayBroadcast::new()),
            push: Arc::new(push),
        }
    }

    #[tokio::test]
    async fn valid_token_registers_connection() {
        let state = test_state().await;
        let token = mint_access_token("test-secret", "usr_1").unwrap();

        let session = authenticate(&state, &token).unwrap();
        assert_eq!(session.user_id, "usr_1");
        assert!(!session.displaced);
        assert!(session.connection_id.starts_with("conn_"));
        assert_eq!(
            state.registry.lookup("usr_1").unwrap().connection_id,
            session.connection_id
        );
    }

    #[tokio::test]
    async fn invalid_token_is_rejected_without_registering() {
        let state = test_state().await;
        assert!(authenticate(&state, "garbage").is_err());
        assert_eq!(state.registry.online_count(), 0);
    }

    #[tokio::test]
    async fn reconnect_is_flagged_as_displacement() {
        let state = test_state().await;
        let token = mint_access_token("test-secret", "usr_1").unwrap();

        let first = authenticate(&state, &token).unwrap();
        let second = authenticate(&state, &token).unwrap();
        assert!(second.displaced);
        assert_ne!(first.connection_id, second.connection_id);
        assert_eq!(
            state.registry.lookup("usr_1").unwrap().connection_id,
            second.connection_id
        );
    }

    #[tokio::test]
    async fn ready_message_names_the_user() {
        let state = test_state().await;
        let token = mint_access_token("test-secret", "usr_1").unwrap();
        let session = authenticate(&state, &token).unwrap();

        let ready = ready_message(&session);
        assert_eq!(ready.event, "ready");
        assert_eq!(ready.data["userId"], "usr_1");
        assert_eq!(ready.data["heartbeatIntervalMs"], HEARTBEAT_INTERVAL_MS);
    }
}
