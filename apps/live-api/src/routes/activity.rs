//! Activity reports and the online-count read.

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use bazaar_common::wire::PresenceSnapshot;

use crate::auth::middleware::AuthUser;
use crate::error::ApiErrorBody;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/activity", post(report_activity))
        .route("/presence", get(get_presence))
}

// ---------------------------------------------------------------------------
// POST /api/v1/activity
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/activity",
    tag = "Presence",
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Activity recorded"),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn report_activity(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
) -> StatusCode {
    state.presence.touch(&user_id, Instant::now());
    StatusCode::NO_CONTENT
}

// ---------------------------------------------------------------------------
// GET /api/v1/presence
// ---------------------------------------------------------------------------

/// Last computed online count. Poll-transport clients read this instead of
/// receiving the broadcast.
#[utoipa::path(
    get,
    path = "/api/v1/presence",
    tag = "Presence",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Approximate online count", body = PresenceSnapshot),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn get_presence(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> Json<PresenceSnapshot> {
    Json(state.presence.snapshot())
}
