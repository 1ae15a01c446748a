//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::DomainError;
use crate::store::StoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("User already exists")]
    EmailTaken,

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Incorrect email or password")]
    BadCredentials,

    /// Conflict retries exhausted; the caller should try again
    #[error("Account is busy, please retry")]
    Busy,

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Server errors (5xx)
    #[error("Could not allocate an unused account number")]
    AccountNumbersExhausted,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }
            AppError::EmailTaken => (StatusCode::BAD_REQUEST, "email_taken", None),

            // 401 Unauthorized
            AppError::Unauthenticated(msg) => {
                (StatusCode::UNAUTHORIZED, "unauthenticated", Some(msg.clone()))
            }
            AppError::BadCredentials => (StatusCode::UNAUTHORIZED, "bad_credentials", None),

            // 409 Conflict
            AppError::Busy => (StatusCode::CONFLICT, "busy", None),

            // Domain errors - map to appropriate HTTP status
            AppError::Domain(ref domain_err) => match domain_err {
                DomainError::InvalidAmount(msg) => {
                    (StatusCode::BAD_REQUEST, "invalid_amount", Some(msg.clone()))
                }
                DomainError::InsufficientFunds { .. } => (
                    StatusCode::BAD_REQUEST,
                    "insufficient_funds",
                    Some(domain_err.to_string()),
                ),
                DomainError::SelfTransfer => {
                    (StatusCode::BAD_REQUEST, "self_transfer", None)
                }
                DomainError::BalanceOverflow => {
                    (StatusCode::BAD_REQUEST, "balance_overflow", None)
                }
                DomainError::AccountNotFound(id) => {
                    (StatusCode::NOT_FOUND, "account_not_found", Some(id.clone()))
                }
                DomainError::RecipientNotFound(number) => (
                    StatusCode::NOT_FOUND,
                    "recipient_not_found",
                    Some(number.clone()),
                ),
            },

            // Store errors
            AppError::Store(ref store_err) => match store_err {
                StoreError::Conflict { .. } => (StatusCode::CONFLICT, "conflict", None),
                StoreError::DuplicateEmail => (StatusCode::BAD_REQUEST, "email_taken", None),
                StoreError::DuplicateAccountNumber => {
                    tracing::error!("account number collision leaked out of the engine");
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
                }
                StoreError::Corrupt(msg) => {
                    tracing::error!("Corrupt store record: {}", msg);
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
                }
                StoreError::Database(e) => {
                    tracing::error!("Database error: {:?}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "store_unavailable", None)
                }
            },

            // 500 Internal Server Error
            AppError::AccountNumbersExhausted => {
                tracing::error!("Account number space exhausted");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "account_numbers_exhausted",
                    None,
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "store_unavailable", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_funds_maps_to_bad_request() {
        let err = AppError::from(DomainError::insufficient_funds(100, 50));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_busy_maps_to_conflict() {
        let response = AppError::Busy.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_recipient_not_found_maps_to_not_found() {
        let err = AppError::from(DomainError::RecipientNotFound("1234567890".to_string()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
