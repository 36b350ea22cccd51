use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use studyhub_realtime::config::Config;
use studyhub_realtime::gateway::fanout::GatewayBroadcast;
use studyhub_realtime::gateway::presence::{spawn_typing_sweeper, PresenceTracker};
use studyhub_realtime::gateway::registry::{ConnectionRegistry, InMemoryRegistry};
use studyhub_realtime::notify::push::{PushDelivery, WebPushClient};
use studyhub_realtime::AppState;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing — env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    // Connect to PostgreSQL.
    let db = studyhub_realtime::db::pool::connect(&config.database_url).await;

    let push: Arc<dyn PushDelivery> = Arc::new(WebPushClient::from_config(&config));

    // In-memory registry for a single serving process. Replace with a
    // shared implementation when the gateway runs on more than one node.
    let registry: Arc<dyn ConnectionRegistry> = Arc::new(InMemoryRegistry::new());

    let state = AppState {
        db,
        config: Arc::new(config),
        snowflake: Arc::new(studyhub_common::SnowflakeGenerator::new(0)),
        registry,
        presence: Arc::new(PresenceTracker::new()),
        broadcast: Arc::new(GatewayBroadcast::new()),
        push,
    };

    spawn_typing_sweeper(state.clone());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(studyhub_realtime::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "realtime-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
