//! Common test utilities

use chrono::Duration;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use kudipay::api::AppState;
use kudipay::domain::Balance;

/// Connect to the test database and truncate all tables.
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::query("TRUNCATE TABLE auth_tokens, transactions, accounts CASCADE")
        .execute(&pool)
        .await
        .expect("Failed to clean up DB");

    pool
}

/// Handler state matching the defaults in `Config`: ₦1000.00 signup bonus,
/// 24h tokens.
pub fn test_state(pool: PgPool) -> AppState {
    AppState {
        pool,
        starting_balance: Balance::new(100_000).expect("valid starting balance"),
        token_ttl: Duration::hours(24),
    }
}
