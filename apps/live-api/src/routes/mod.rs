pub mod activity;
pub mod health;
pub mod notifications;
pub mod typing;

use axum::Router;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::gateway::{poll, server};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest(
            "/api/v1",
            server::router()
                .merge(poll::router())
                .merge(activity::router())
                .merge(typing::router())
                .merge(notifications::router()),
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
        // Live delivery
        server::open_stream,
        poll::poll,
        typing::send_typing,
        // Presence
        activity::report_activity,
        activity::get_presence,
        // Notifications
        notifications::get_unread_counts,
        notifications::list_notifications,
        notifications::mark_read,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            // Wire types
            bazaar_common::wire::PollResponse,
            bazaar_common::wire::UnreadCounts,
            bazaar_common::wire::NotificationView,
            bazaar_common::wire::NotificationsResponse,
            bazaar_common::wire::PresenceSnapshot,
            bazaar_common::wire::TypingRequest,
            bazaar_common::wire::MarkReadRequest,
            // Route response types
            health::HealthResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Live", description = "Event stream and poll fallback"),
        (name = "Presence", description = "Activity reports and online count"),
        (name = "Notifications", description = "Unread counts and notification history"),
    )
)]
pub struct ApiDoc;
