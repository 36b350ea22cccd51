//! Web Push delivery behind a swappable trait.
//!
//! The real client signs a VAPID JWT (ES256) per push-service origin and
//! POSTs to the subscription endpoint. Without configured VAPID keys the
//! client is a no-op that logs once per attempt, so the rest of the
//! pipeline behaves identically in environments with push disabled.

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;

use crate::config::Config;
use crate::error::ApiError;
use crate::models::push_subscription::PushSubscription;

const PUSH_REQUEST_TIMEOUT_SECS: u64 = 10;
const VAPID_TOKEN_TTL_SECS: i64 = 12 * 60 * 60;

/// Delivery to a user's registered push endpoint. Implementations must be
/// best-effort safe: callers log failures and never propagate them.
#[async_trait]
pub trait PushDelivery: Send + Sync {
    async fn send(&self, subscription: &PushSubscription, payload: &str) -> Result<(), ApiError>;
}

#[derive(Serialize)]
struct VapidClaims<'a> {
    aud: &'a str,
    exp: i64,
    sub: &'a str,
}

struct VapidConfig {
    public_key: String,
    encoding_key: EncodingKey,
    subject: String,
}

/// HTTP Web Push client using VAPID (RFC 8292) authorization.
pub struct WebPushClient {
    http: reqwest::Client,
    vapid: Option<VapidConfig>,
}

impl WebPushClient {
    pub fn from_config(config: &Config) -> Self {
        let vapid = match (&config.vapid_public_key, &config.vapid_private_key_pem) {
            (Some(public_key), Some(pem)) => match EncodingKey::from_ec_pem(pem.as_bytes()) {
                Ok(encoding_key) => Some(VapidConfig {
                    public_key: public_key.clone(),
                    encoding_key,
                    subject: config.vapid_subject.clone(),
                }),
                Err(err) => {
                    tracing::warn!(?err, "invalid VAPID private key, device push disabled");
                    None
                }
            },
            _ => None,
        };

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(PUSH_REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self { http, vapid }
    }

    fn vapid_token(&self, vapid: &VapidConfig, audience: &str) -> Result<String, ApiError> {
        let claims = VapidClaims {
            aud: audience,
            exp: Utc::now().timestamp() + VAPID_TOKEN_TTL_SECS,
            sub: &vapid.subject,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::ES256), &claims, &vapid.encoding_key)
            .map_err(|err| {
                tracing::error!(?err, "failed to sign VAPID token");
                ApiError::internal("VAPID signing failed")
            })
    }
}

#[async_trait]
impl PushDelivery for WebPushClient {
    async fn send(&self, subscription: &PushSubscription, _payload: &str) -> Result<(), ApiError> {
        let Some(vapid) = &self.vapid else {
            tracing::debug!(user_id = %subscription.user_id, "VAPID keys not configured, skipping device push");
            return Ok(());
        };

        let audience = endpoint_origin(&subscription.endpoint).ok_or_else(|| {
            ApiError::delivery_failed(format!(
                "push endpoint has no valid origin: {}",
                subscription.endpoint
            ))
        })?;

        let token = self.vapid_token(vapid, &audience)?;

        // TODO: aes128gcm payload encryption (RFC 8291) so the wake-up can
        // carry the notification body instead of an empty push.
        let response = self
            .http
            .post(&subscription.endpoint)
            .header(
                "Authorization",
                format!("vapid t={token}, k={}", vapid.public_key),
            )
            .header("TTL", "86400")
            .body(Vec::new())
            .send()
            .await
            .map_err(|err| ApiError::delivery_failed(format!("push request failed: {err}")))?;

        if !response.status().is_success() {
            return Err(ApiError::delivery_failed(format!(
                "push service responded {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// Scheme and authority of a push endpoint, used as the VAPID audience.
fn endpoint_origin(endpoint: &str) -> Option<String> {
    let (scheme, rest) = endpoint.split_once("://")?;
    if scheme != "https" && scheme != "http" {
        return None;
    }
    let authority = rest.split('/').next()?;
    if authority.is_empty() {
        return None;
    }
    Some(format!("{scheme}://{authority}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_strips_path() {
        assert_eq!(
            endpoint_origin("https://fcm.googleapis.com/fcm/send/abc123").as_deref(),
            Some("https://fcm.googleapis.com")
        );
    }

    #[test]
    fn origin_without_path_is_kept() {
        assert_eq!(
            endpoint_origin("https://updates.push.services.mozilla.com").as_deref(),
            Some("https://updates.push.services.mozilla.com")
        );
    }

    #[test]
    fn origin_rejects_garbage() {
        assert_eq!(endpoint_origin("not a url"), None);
        assert_eq!(endpoint_origin("ftp://example.com/x"), None);
        assert_eq!(endpoint_origin("https:///path-only"), None);
    }

    #[tokio::test]
    async fn send_without_vapid_keys_is_a_no_op() {
        let config = Config {
            database_url: "postgres://localhost/unused".to_string(),
            token_secret: "secret".to_string(),
            port: 0,
            vapid_public_key: None,
            vapid_private_key_pem: None,
            vapid_subject: "mailto:test@example.com".to_string(),
            typing_timeout_secs: 10,
        };
        let client = WebPushClient::from_config(&config);
        let subscription = PushSubscription {
            user_id: "usr_1".to_string(),
            endpoint: "https://push.example.com/send/abc".to_string(),
            p256dh: "key".to_string(),
            auth: "auth".to_string(),
            updated_at: Utc::now(),
        };
        assert!(client.send(&subscription, "{}").await.is_ok());
    }
}
