pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod notify;
pub mod routes;

use std::sync::Arc;

use config::Config;
use db::pool::DbPool;
use gateway::fanout::GatewayBroadcast;
use gateway::presence::PresenceTracker;
use gateway::registry::ConnectionRegistry;
use notify::push::PushDelivery;
use studyhub_common::SnowflakeGenerator;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<Config>,
    pub snowflake: Arc<SnowflakeGenerator>,
    pub registry: Arc<dyn ConnectionRegistry>,
    pub presence: Arc<PresenceTracker>,
    pub broadcast: Arc<GatewayBroadcast>,
    pub push: Arc<dyn PushDelivery>,
}
