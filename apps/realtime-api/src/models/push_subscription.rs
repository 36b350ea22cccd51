use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::db::schema::push_subscriptions;

/// One browser/device push subscription per user. A new registration
/// replaces the prior payload, so only the most recent device is pushed to.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = push_subscriptions)]
pub struct PushSubscription {
    pub user_id: String,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = push_subscriptions)]
pub struct NewPushSubscription<'a> {
    pub user_id: &'a str,
    pub endpoint: &'a str,
    pub p256dh: &'a str,
    pub auth: &'a str,
    pub updated_at: DateTime<Utc>,
}
