//! Reconciliation reads: authoritative unread counts and recent
//! notifications, plus mark-as-read.

use axum::extract::{Query, State};
use axum::http::header::{HeaderName, CACHE_CONTROL};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use bazaar_common::wire::{MarkReadRequest, NotificationsResponse, UnreadCounts};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody};
use crate::AppState;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/unread-counts", get(get_unread_counts))
        .route("/notifications", get(list_notifications))
        .route("/notifications/read", put(mark_read))
}

// ---------------------------------------------------------------------------
// GET /api/v1/unread-counts
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/unread-counts",
    tag = "Notifications",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Unread totals", body = UnreadCounts),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn get_unread_counts(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
) -> Result<([(HeaderName, &'static str); 1], Json<UnreadCounts>), ApiError> {
    let counts = state.notifications.unread_counts(&user_id).await?;
    Ok(([(CACHE_CONTROL, "no-store")], Json(counts)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListNotificationsQuery {
    /// Maximum rows to return (default 20, max 100).
    pub limit: Option<usize>,
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    tag = "Notifications",
    security(("bearer" = [])),
    params(ListNotificationsQuery),
    responses(
        (status = 200, description = "Recent notifications, newest first", body = NotificationsResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn list_notifications(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<NotificationsResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let notifications = state.notifications.recent(&user_id, limit).await?;
    Ok(Json(NotificationsResponse { notifications }))
}

// ---------------------------------------------------------------------------
// PUT /api/v1/notifications/read
// ---------------------------------------------------------------------------

#[utoipa::path(
    put,
    path = "/api/v1/notifications/read",
    tag = "Notifications",
    security(("bearer" = [])),
    request_body = MarkReadRequest,
    responses(
        (status = 204, description = "Marked as read"),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn mark_read(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<MarkReadRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .notifications
        .mark_read(&user_id, body.chat_scope_id.as_deref())
        .await?;
    tracing::debug!(%user_id, scope = ?body.chat_scope_id, "marked read");
    Ok(StatusCode::NO_CONTENT)
}
