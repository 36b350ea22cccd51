//! Access-token validation.
//!
//! The platform's auth service mints HS256 JWTs; this service only needs to
//! validate them and extract the user id. The same validator backs both the
//! HTTP bearer middleware and the gateway handshake, so a WebSocket client
//! cannot assert an identity it does not hold a token for.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Access-token TTL in seconds (1 hour). Used by `mint_access_token` only.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 3600;

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Validate an access token and return its claims.
pub fn validate_access_token(secret: &str, token: &str) -> Result<AccessClaims, ApiError> {
    let validation = Validation::new(Algorithm::HS256);
    let data = jsonwebtoken::decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!(?e, "access token validation failed");
        ApiError::unauthorized("Invalid or expired token")
    })?;

    Ok(data.claims)
}

/// Mint an access token. The auth service owns minting in production; this
/// exists for local development and the test suite.
pub fn mint_access_token(secret: &str, user_id: &str) -> Result<String, ApiError> {
    let now = chrono::Utc::now().timestamp();
    let claims = AccessClaims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + ACCESS_TOKEN_TTL_SECS,
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!(?e, "failed to mint access token");
        ApiError::internal("Token minting failed")
    })
}
