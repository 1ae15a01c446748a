//! API Middleware
//!
//! The authenticated-caller identity resolver: maps a bearer token to an
//! account identifier, or rejects the request.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::auth;

use super::AppState;

/// Identity of the authenticated caller, injected as a request extension.
#[derive(Debug, Clone, Copy)]
pub struct CallerIdentity {
    pub account_id: Uuid,
}

/// Resolve `Authorization: Bearer <token>` to a [`CallerIdentity`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let header = match headers.get("Authorization").and_then(|v| v.to_str().ok()) {
        Some(value) => value,
        None => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "Missing Authorization header",
                    "error_code": "unauthenticated"
                })),
            )
                .into_response());
        }
    };

    // Accept "Bearer <token>" or a bare token
    let token = header.strip_prefix("Bearer ").unwrap_or(header);

    let row: Option<(Uuid, DateTime<Utc>)> = match sqlx::query_as(
        r#"
        SELECT account_id, expires_at
        FROM auth_tokens
        WHERE token_hash = $1
        "#,
    )
    .bind(auth::token_hash(token))
    .fetch_optional(&state.pool)
    .await
    {
        Ok(row) => row,
        Err(e) => {
            tracing::error!("Database error during token validation: {}", e);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal server error",
                    "error_code": "store_unavailable"
                })),
            )
                .into_response());
        }
    };

    let (account_id, expires_at) = match row {
        Some(row) => row,
        None => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "Invalid token",
                    "error_code": "unauthenticated"
                })),
            )
                .into_response());
        }
    };

    if expires_at < Utc::now() {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "Token expired",
                "error_code": "unauthenticated"
            })),
        )
            .into_response());
    }

    request.extensions_mut().insert(CallerIdentity { account_id });

    Ok(next.run(request).await)
}
