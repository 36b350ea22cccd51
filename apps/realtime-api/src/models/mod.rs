pub mod message;
pub mod notification;
pub mod push_subscription;
pub mod user;
