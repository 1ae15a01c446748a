//! API module
//!
//! HTTP surface: routes, middleware, and router assembly.

pub mod middleware;
pub mod routes;

use axum::{middleware as axum_middleware, routing::get, Router};
use chrono::Duration;
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::domain::Balance;

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub starting_balance: Balance,
    pub token_ttl: Duration,
}

impl AppState {
    pub fn new(pool: PgPool, config: &Config) -> Self {
        Self {
            pool,
            starting_balance: Balance::new(config.starting_balance_minor).unwrap_or_else(|e| {
                tracing::warn!("STARTING_BALANCE_MINOR out of range ({e}), using 0");
                Balance::zero()
            }),
            token_ttl: Duration::hours(config.token_ttl_hours),
        }
    }
}

/// Build the application router.
///
/// Signup and login are public; everything else sits behind the
/// bearer-token identity resolver.
pub fn build_router(state: AppState) -> Router {
    let protected = routes::protected_router().layer(axum_middleware::from_fn_with_state(
        state.clone(),
        middleware::auth_middleware,
    ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", routes::public_router().merge(protected))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
