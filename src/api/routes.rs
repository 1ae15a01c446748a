//! API Routes
//!
//! HTTP endpoint definitions and request/response types.

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth;
use crate::domain::{AccountNumber, Amount, DomainError};
use crate::error::AppError;
use crate::ledger::{LedgerEngine, OpenAccount};
use crate::store::{Account, PgStore, ProfileChanges, TransactionRecord};
use crate::store::LedgerStore;

use super::middleware::CallerIdentity;
use super::AppState;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// External 10-digit routing identifier
    pub account_number: i64,
    /// Balance in minor units (kobo)
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            first_name: account.first_name,
            last_name: account.last_name,
            email: account.email,
            account_number: account.account_number.value(),
            balance: account.balance.minor_units(),
            created_at: account.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub msg: String,
    pub account: AccountResponse,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub msg: String,
    pub token: String,
    pub account: AccountResponse,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateProfileResponse {
    pub msg: String,
    pub account: AccountResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Recipient's 10-digit account number
    pub recipient_account: i64,
    /// Amount in minor units (kobo)
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub msg: String,
    /// Sender balance after the transfer, in minor units
    pub balance: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AirtimeRequest {
    /// Amount in minor units (kobo)
    pub amount: i64,
    pub network: String,
}

#[derive(Debug, Serialize)]
pub struct AirtimeResponse {
    pub msg: String,
    /// Balance after the purchase, in minor units
    pub balance: i64,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    /// Amount in minor units (kobo)
    pub amount: i64,
    pub description: String,
    pub date: DateTime<Utc>,
}

impl From<TransactionRecord> for TransactionResponse {
    fn from(record: TransactionRecord) -> Self {
        Self {
            id: record.id,
            kind: record.kind.as_str().to_string(),
            amount: record.amount.minor_units(),
            description: record.description,
            date: record.created_at,
        }
    }
}

// =========================================================================
// Routers
// =========================================================================

/// Routes reachable without a token.
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}

/// Routes behind the identity resolver.
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/update", put(update_profile))
        .route("/transfer", post(transfer))
        .route("/airtime", post(airtime))
        .route("/history", get(history))
}

fn engine(state: &AppState) -> LedgerEngine<PgStore> {
    LedgerEngine::new(PgStore::new(state.pool.clone()))
}

fn is_valid_email(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        _ => false,
    }
}

// =========================================================================
// POST /signup
// =========================================================================

async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), AppError> {
    if request.first_name.trim().is_empty()
        || request.last_name.trim().is_empty()
        || request.email.trim().is_empty()
        || request.password.is_empty()
    {
        return Err(AppError::InvalidRequest(
            "All fields are required".to_string(),
        ));
    }
    if !is_valid_email(&request.email) {
        return Err(AppError::InvalidRequest("Invalid email format".to_string()));
    }

    let account = engine(&state)
        .open_account(OpenAccount {
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            email: request.email.trim().to_string(),
            password_hash: auth::hash_password(&request.password),
            starting_balance: state.starting_balance,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            msg: "Signup successful".to_string(),
            account: account.into(),
        }),
    ))
}

// =========================================================================
// POST /login
// =========================================================================

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(AppError::InvalidRequest(
            "Email and password are required".to_string(),
        ));
    }
    if !is_valid_email(&request.email) {
        return Err(AppError::InvalidRequest("Invalid email format".to_string()));
    }

    let store = PgStore::new(state.pool.clone());
    let account = store
        .find_by_email(request.email.trim())
        .await?
        .ok_or(AppError::BadCredentials)?;

    if !auth::verify_password(&request.password, &account.password_hash) {
        return Err(AppError::BadCredentials);
    }

    let token = auth::generate_token();
    let expires_at = Utc::now() + state.token_ttl;

    sqlx::query(
        r#"
        INSERT INTO auth_tokens (token_hash, account_id, expires_at)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(auth::token_hash(&token))
    .bind(account.id)
    .bind(expires_at)
    .execute(&state.pool)
    .await?;

    Ok(Json(LoginResponse {
        msg: "Login successful".to_string(),
        token,
        account: account.into(),
    }))
}

// =========================================================================
// GET /me
// =========================================================================

async fn me(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
) -> Result<Json<AccountResponse>, AppError> {
    let account = engine(&state).account(caller.account_id).await?;
    Ok(Json(account.into()))
}

// =========================================================================
// PUT /update
// =========================================================================

async fn update_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UpdateProfileResponse>, AppError> {
    if let Some(ref email) = request.email {
        if !is_valid_email(email) {
            return Err(AppError::InvalidRequest("Invalid email format".to_string()));
        }
    }

    let store = PgStore::new(state.pool.clone());
    let changes = ProfileChanges {
        first_name: request.first_name,
        last_name: request.last_name,
        email: request.email,
    };

    let account = if changes.is_empty() {
        engine(&state).account(caller.account_id).await?
    } else {
        store.update_profile(caller.account_id, changes).await?
    };

    Ok(Json(UpdateProfileResponse {
        msg: "Profile updated".to_string(),
        account: account.into(),
    }))
}

// =========================================================================
// POST /transfer
// =========================================================================

async fn transfer(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<TransferResponse>, AppError> {
    let amount = Amount::new(request.amount)
        .map_err(|e| DomainError::InvalidAmount(e.to_string()))?;
    let recipient = AccountNumber::new(request.recipient_account)
        .map_err(|e| AppError::InvalidRequest(format!("Invalid recipient account number: {e}")))?;

    let receipt = engine(&state)
        .transfer(caller.account_id, recipient, amount)
        .await?;

    Ok(Json(TransferResponse {
        msg: "Transfer successful".to_string(),
        balance: receipt.sender_balance.minor_units(),
    }))
}

// =========================================================================
// POST /airtime
// =========================================================================

async fn airtime(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(request): Json<AirtimeRequest>,
) -> Result<Json<AirtimeResponse>, AppError> {
    let amount = Amount::new(request.amount)
        .map_err(|e| DomainError::InvalidAmount(e.to_string()))?;

    let receipt = engine(&state)
        .airtime(caller.account_id, amount, &request.network)
        .await?;

    Ok(Json(AirtimeResponse {
        msg: "Airtime purchased successfully".to_string(),
        balance: receipt.balance.minor_units(),
    }))
}

// =========================================================================
// GET /history
// =========================================================================

async fn history(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
) -> Result<Json<Vec<TransactionResponse>>, AppError> {
    let records = engine(&state).history(caller.account_id).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("a.b@sub.example.co"));
        assert!(!is_valid_email("ada"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ada@@example.com"));
    }

    #[test]
    fn test_transaction_response_uses_wire_names() {
        let record = TransactionRecord {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            kind: crate::store::TransactionKind::Airtime,
            amount: Amount::new(500_00).unwrap(),
            description: "Airtime purchase (MTN)".to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(TransactionResponse::from(record)).unwrap();
        assert_eq!(json["type"], "airtime");
        assert_eq!(json["amount"], 50_000);
        assert_eq!(json["description"], "Airtime purchase (MTN)");
        assert!(json.get("date").is_some());
    }
}
