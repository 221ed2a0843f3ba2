//! Access-token extractors.
//!
//! JSON endpoints take `Authorization: Bearer <token>`. The stream endpoint
//! takes `?token=<token>` because a browser's native event-stream client cannot
//! set request headers.

use axum::extract::{FromRequestParts, Query};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::auth::tokens;
use crate::AppState;

/// Authenticated user extracted from the `Authorization: Bearer <token>` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

/// Authenticated user extracted from the `token` query parameter.
#[derive(Debug, Clone)]
pub struct StreamAuth {
    pub user_id: String,
}

/// Rejection returned when the token is missing or invalid.
#[derive(Debug)]
pub struct AuthError {
    message: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": "UNAUTHORIZED",
                "message": self.message
            }
        });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

async fn resolve(state: &AppState, token: &str) -> Result<String, AuthError> {
    let data = tokens::lookup_access_token(state.kv.as_ref(), token)
        .await
        .map_err(|_| AuthError {
            message: "Token lookup failed",
        })?
        .ok_or(AuthError {
            message: "Invalid or expired token",
        })?;
    Ok(data.user_id)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError {
                message: "Missing Authorization header",
            })?;

        let token = header.strip_prefix("Bearer ").ok_or(AuthError {
            message: "Invalid Authorization header format",
        })?;

        Ok(AuthUser {
            user_id: resolve(state, token).await?,
        })
    }
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

impl FromRequestParts<AppState> for StreamAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = Query::<TokenQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(q)| q.token)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError {
                message: "Missing token query parameter",
            })?;

        Ok(StreamAuth {
            user_id: resolve(state, &token).await?,
        })
    }
}
