//! Shared test harness.
//!
//! Builds an AppState around a connection pool that is never actually
//! connected: the gateway, presence, and typing paths exercised here touch
//! the database only through spawned best-effort writes, which log and
//! swallow their failures.

use std::net::SocketAddr;
use std::sync::Arc;

use studyhub_realtime::config::Config;
use studyhub_realtime::gateway::fanout::GatewayBroadcast;
use studyhub_realtime::gateway::presence::PresenceTracker;
use studyhub_realtime::gateway::registry::{ConnectionRegistry, InMemoryRegistry};
use studyhub_realtime::notify::push::{PushDelivery, WebPushClient};
use studyhub_realtime::AppState;

pub const TEST_TOKEN_SECRET: &str = "test-secret";

pub fn test_config() -> Config {
    Config {
        // Deliberately unreachable; nothing in these tests may require a
        // live database.
        database_url: "postgres://127.0.0.1:1/studyhub_test_unreachable".to_string(),
        token_secret: TEST_TOKEN_SECRET.to_string(),
        port: 0,
        vapid_public_key: None,
        vapid_private_key_pem: None,
        vapid_subject: "mailto:test@example.com".to_string(),
        typing_timeout_secs: 10,
    }
}

pub async fn test_state() -> AppState {
    let config = test_config();
    let db = studyhub_realtime::db::pool::connect(&config.database_url).await;
    let push: Arc<dyn PushDelivery> = Arc::new(WebPushClient::from_config(&config));
    let registry: Arc<dyn ConnectionRegistry> = Arc::new(InMemoryRegistry::new());

    AppState {
        db,
        config: Arc::new(config),
        snowflake: Arc::new(studyhub_common::SnowflakeGenerator::new(0)),
        registry,
        presence: Arc::new(PresenceTracker::new()),
        broadcast: Arc::new(GatewayBroadcast::new()),
        push,
    }
}

/// Start the full router on a real TCP listener. Returns the bound address
/// and the state for registry/presence assertions.
pub async fn start_server() -> (SocketAddr, AppState) {
    let state = test_state().await;
    let app = studyhub_realtime::routes::router().with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

pub fn mint_token(user_id: &str) -> String {
    studyhub_realtime::auth::tokens::mint_access_token(TEST_TOKEN_SECRET, user_id)
        .expect("mint token")
}

/// Build an AppState against the real `_test`-suffixed database, as created
/// by `realtime-migrate --test`. Tests of persisted invariants use this;
/// everything else stays on the disconnected `test_state`.
#[allow(dead_code)]
pub async fn db_state() -> AppState {
    let env_path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(env_path);

    let mut config = test_config();
    config.database_url = with_test_db_suffix(
        &std::env::var("DATABASE_URL").expect("DATABASE_URL env var is required for DB tests"),
    );

    let db = studyhub_realtime::db::pool::connect(&config.database_url).await;
    let push: Arc<dyn PushDelivery> = Arc::new(WebPushClient::from_config(&config));
    let registry: Arc<dyn ConnectionRegistry> = Arc::new(InMemoryRegistry::new());

    AppState {
        db,
        config: Arc::new(config),
        snowflake: Arc::new(studyhub_common::SnowflakeGenerator::new(0)),
        registry,
        presence: Arc::new(PresenceTracker::new()),
        broadcast: Arc::new(GatewayBroadcast::new()),
        push,
    }
}

fn with_test_db_suffix(database_url: &str) -> String {
    let (base, query) = match database_url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (database_url, None),
    };

    let Some((prefix, db_name)) = base.rsplit_once('/') else {
        return database_url.to_string();
    };
    if db_name.is_empty() || db_name.ends_with("_test") {
        return database_url.to_string();
    }

    match query {
        Some(query) => format!("{prefix}/{db_name}_test?{query}"),
        None => format!("{prefix}/{db_name}_test"),
    }
}

/// Insert a user row so message/notification foreign keys hold.
#[allow(dead_code)]
pub async fn seed_user(db: &studyhub_realtime::db::pool::DbPool, user_id: &str) {
    use diesel::prelude::*;
    use studyhub_realtime::db::schema::users;

    let mut conn = db.get().await.expect("pool");
    diesel_async::RunQueryDsl::execute(
        diesel::insert_into(users::table)
            .values((users::id.eq(user_id), users::username.eq(user_id)))
            .on_conflict_do_nothing(),
        &mut conn,
    )
    .await
    .expect("seed user");
}

/// Remove a test user; messages and notifications cascade with it.
#[allow(dead_code)]
pub async fn cleanup_user(db: &studyhub_realtime::db::pool::DbPool, user_id: &str) {
    use diesel::prelude::*;
    use studyhub_realtime::db::schema::users;

    let mut conn = db.get().await.expect("pool");
    diesel_async::RunQueryDsl::execute(
        diesel::delete(users::table.filter(users::id.eq(user_id))),
        &mut conn,
    )
    .await
    .expect("cleanup user");
}
