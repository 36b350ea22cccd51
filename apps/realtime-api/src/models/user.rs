use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::pool::DbPool;
use crate::db::schema::users;
use crate::error::ApiError;

#[derive(Debug, Clone, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = users)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub is_online: bool,
    pub last_seen_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Persist `is_online` / `last_seen_at` for a user.
///
/// This is the durable shadow of the in-memory registry, written on every
/// connect and disconnect. Callers spawn it and log failures; the registry
/// stays authoritative for live relay whether or not this write lands.
pub async fn persist_presence(db: &DbPool, user_id: &str, is_online: bool) -> Result<(), ApiError> {
    let mut conn = db.get().await?;

    diesel_async::RunQueryDsl::execute(
        diesel::update(users::table.find(user_id)).set((
            users::is_online.eq(is_online),
            users::last_seen_at.eq(Utc::now()),
        )),
        &mut conn,
    )
    .await?;

    Ok(())
}
