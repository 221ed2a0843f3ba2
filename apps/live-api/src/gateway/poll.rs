//! Poll transport: clients that cannot hold a stream open fetch recent events
//! from their buffer.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use bazaar_common::wire::PollResponse;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/poll", get(poll))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PollQuery {
    /// RFC 3339 timestamp; only events emitted strictly after it are returned.
    pub since: Option<String>,
}

impl PollQuery {
    fn since(&self) -> Result<Option<DateTime<Utc>>, ApiError> {
        match self.since.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map(|ts| Some(ts.with_timezone(&Utc)))
                .map_err(|_| ApiError::bad_request("`since` must be an RFC 3339 timestamp")),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/poll",
    tag = "Live",
    security(("bearer" = [])),
    params(PollQuery),
    responses(
        (status = 200, description = "Buffered events newer than `since`", body = PollResponse),
        (status = 400, description = "Malformed `since`", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn poll(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PollQuery>,
) -> Result<Json<PollResponse>, ApiError> {
    let since = query.since()?;
    let events = state.buffer.since(&user_id, since, Utc::now());

    tracing::debug!(%user_id, ?since, returned = events.len(), "poll");
    Ok(Json(PollResponse { events }))
}
