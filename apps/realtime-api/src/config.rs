/// Realtime API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// HS256 secret shared with the platform's auth service.
    pub token_secret: String,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// VAPID public key (base64url, uncompressed P-256 point) sent in push requests.
    pub vapid_public_key: Option<String>,
    /// VAPID private key as a PEM-encoded EC key. Device push is disabled when unset.
    pub vapid_private_key_pem: Option<String>,
    /// VAPID contact, e.g. `mailto:ops@studyhub.app`.
    pub vapid_subject: String,
    /// Seconds of silence before a stuck typing indicator is cleared.
    pub typing_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_var("DATABASE_URL"),
            token_secret: required_var("TOKEN_SECRET"),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4000),
            vapid_public_key: std::env::var("VAPID_PUBLIC_KEY").ok().filter(|s| !s.is_empty()),
            vapid_private_key_pem: std::env::var("VAPID_PRIVATE_KEY_PEM")
                .ok()
                .filter(|s| !s.is_empty()),
            vapid_subject: std::env::var("VAPID_SUBJECT")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "mailto:ops@studyhub.app".to_string()),
            typing_timeout_secs: std::env::var("TYPING_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        }
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}
