use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use bazaar_common::wire::{TypingPayload, TypingRequest};
use bazaar_common::EventPayload;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody};
use crate::gateway::events::Event;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/typing", post(send_typing))
}

/// Relay a typing indicator to the other chat party. Never stored and never
/// counted as unread.
#[utoipa::path(
    post,
    path = "/api/v1/typing",
    tag = "Live",
    security(("bearer" = [])),
    request_body = TypingRequest,
    responses(
        (status = 204, description = "Indicator relayed"),
        (status = 400, description = "Invalid recipient or scope", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn send_typing(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<TypingRequest>,
) -> Result<StatusCode, ApiError> {
    if body.recipient_id.trim().is_empty() || body.chat_scope_id.trim().is_empty() {
        return Err(ApiError::bad_request("recipient_id and chat_scope_id are required"));
    }
    if body.recipient_id == user_id {
        return Err(ApiError::bad_request("Cannot send a typing indicator to yourself"));
    }

    let event = Event::new(
        EventPayload::Typing(TypingPayload {
            chat_scope_id: body.chat_scope_id,
            user_id,
            is_typing: body.is_typing,
        }),
        [body.recipient_id],
    );
    state.publisher.publish(&event);
    Ok(StatusCode::NO_CONTENT)
}
