pub mod health;
pub mod messages;
pub mod notifications;
pub mod push;

use axum::Router;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::gateway::server::router())
        .nest(
            "/api/v1",
            messages::router()
                .merge(notifications::router())
                .merge(push::router()),
        )
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health,
        // Messages
        messages::send_message,
        messages::message_history,
        messages::edit_message,
        messages::delete_message,
        messages::list_conversations,
        // Notifications
        notifications::create_notification,
        notifications::list_notifications,
        notifications::mark_read,
        notifications::mark_all_read,
        notifications::clear_notifications,
        // Push
        push::subscribe,
        push::unsubscribe,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            // Models
            crate::models::message::Message,
            crate::models::notification::Notification,
            crate::models::user::User,
            // Route request/response types
            health::HealthResponse,
            messages::SendMessageRequest,
            messages::EditMessageRequest,
            notifications::CreateNotificationRequest,
            notifications::BulkUpdateResponse,
            push::SubscribeRequest,
            push::SubscriptionKeys,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Messages", description = "Direct messaging"),
        (name = "Notifications", description = "Notification fan-out and read state"),
        (name = "Push", description = "Web Push subscriptions"),
    ),
)]
pub struct ApiDoc;
