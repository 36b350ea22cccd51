//! In-memory typing-indicator state.
//!
//! Typing is client-asserted and would otherwise only decay when the client
//! clears it or disconnects cleanly. A background sweep clears entries that
//! have not been refreshed within the timeout so an abrupt disconnect can't
//! leave a stuck "is typing" indicator.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::gateway::events::EventName;
use crate::gateway::fanout::BroadcastPayload;
use crate::AppState;

struct TypingState {
    /// Who the indicator is aimed at.
    target: String,
    /// Last refresh, for the sweeper.
    updated_at: Instant,
}

/// A typing indicator the sweeper just cleared.
pub struct ClearedTyping {
    pub user_id: String,
    pub target: String,
}

/// Thread-safe, DashMap-backed typing tracker.
pub struct PresenceTracker {
    inner: DashMap<String, TypingState>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Record a typing assertion from a user. `is_typing = false` clears it.
    pub fn set_typing(&self, user_id: &str, target: &str, is_typing: bool) {
        if is_typing {
            self.inner.insert(
                user_id.to_string(),
                TypingState {
                    target: target.to_string(),
                    updated_at: Instant::now(),
                },
            );
        } else {
            self.inner.remove(user_id);
        }
    }

    /// Drop all typing state for a user (connection closed).
    pub fn clear(&self, user_id: &str) -> Option<ClearedTyping> {
        self.inner.remove(user_id).map(|(user_id, state)| ClearedTyping {
            user_id,
            target: state.target,
        })
    }

    /// Whom the user is currently typing to, if anyone.
    pub fn typing_target(&self, user_id: &str) -> Option<String> {
        self.inner.get(user_id).map(|e| e.target.clone())
    }

    /// Remove entries not refreshed within `timeout` and return them so the
    /// caller can tell each target the indicator is gone.
    pub fn sweep_stale(&self, timeout: Duration) -> Vec<ClearedTyping> {
        let now = Instant::now();
        let stale: Vec<String> = self
            .inner
            .iter()
            .filter(|entry| now.duration_since(entry.value().updated_at) > timeout)
            .map(|entry| entry.key().clone())
            .collect();

        stale
            .into_iter()
            .filter_map(|user_id| self.clear(&user_id))
            .collect()
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Background task: periodically clear stale typing indicators and notify
/// the affected receivers.
pub fn spawn_typing_sweeper(state: AppState) {
    let timeout = Duration::from_secs(state.config.typing_timeout_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(timeout / 2);
        loop {
            interval.tick().await;
            for cleared in state.presence.sweep_stale(timeout) {
                tracing::debug!(user_id = %cleared.user_id, "typing indicator timed out");
                state.broadcast.dispatch(BroadcastPayload::user(
                    &cleared.target,
                    EventName::USER_TYPING,
                    serde_json::json!({
                        "userId": cleared.user_id,
                        "isTyping": false,
                    }),
                ));
            }
        }
    });
}
