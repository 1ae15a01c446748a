//! Persistence layer
//!
//! The ledger engine talks to storage through the [`LedgerStore`] trait.
//! [`PgStore`] is the production backend; [`MemoryStore`] backs the engine
//! property tests.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{AccountNumber, Amount, Balance};

/// Persisted account record.
///
/// `version` is the optimistic-concurrency stamp: every committed balance
/// mutation increments it, and a conditional write against a stale version
/// fails with [`StoreError::Conflict`].
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub account_number: AccountNumber,
    pub balance: Balance,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub account_number: AccountNumber,
    pub balance: Balance,
}

/// Partial profile update. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.email.is_none()
    }
}

/// Kind of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Transfer,
    Airtime,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::Airtime => "airtime",
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transfer" => Ok(Self::Transfer),
            "airtime" => Ok(Self::Airtime),
            other => Err(StoreError::Corrupt(format!(
                "unknown transaction kind '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable, append-only ledger entry.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kind: TransactionKind,
    pub amount: Amount,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A ledger entry awaiting persistence.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub owner_id: Uuid,
    pub kind: TransactionKind,
    pub amount: Amount,
    pub description: String,
}

/// Conditional balance write: apply `new_balance` to `account_id` only if the
/// stored version still equals `expected_version`.
#[derive(Debug, Clone)]
pub struct BalanceUpdate {
    pub account_id: Uuid,
    pub new_balance: Balance,
    pub expected_version: i64,
}

/// Errors surfaced by a store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Conditional write lost a race: the account changed since it was read
    #[error("Concurrent modification of account {account_id}")]
    Conflict { account_id: Uuid },

    /// Unique constraint on email rejected the write
    #[error("Email is already registered")]
    DuplicateEmail,

    /// Unique constraint on account number rejected the write
    #[error("Account number is already taken")]
    DuplicateAccountNumber,

    /// Stored data failed domain validation on read
    #[error("Corrupt stored record: {0}")]
    Corrupt(String),

    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Storage contract consumed by the ledger engine.
///
/// `commit` is the only mutation path for balances and ledger entries, and it
/// is all-or-nothing: either every update passes its version check and every
/// record is appended, or nothing is persisted.
pub trait LedgerStore: Clone + Send + Sync + 'static {
    fn find_by_identity(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Account>, StoreError>> + Send;

    fn find_by_account_number(
        &self,
        number: AccountNumber,
    ) -> impl std::future::Future<Output = Result<Option<Account>, StoreError>> + Send;

    fn find_by_email(
        &self,
        email: &str,
    ) -> impl std::future::Future<Output = Result<Option<Account>, StoreError>> + Send;

    /// Insert a new account. The store enforces uniqueness of both email and
    /// account number at write time.
    fn create_account(
        &self,
        new: NewAccount,
    ) -> impl std::future::Future<Output = Result<Account, StoreError>> + Send;

    fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> impl std::future::Future<Output = Result<Account, StoreError>> + Send;

    /// Atomically apply the balance updates and append the ledger entries.
    fn commit(
        &self,
        updates: Vec<BalanceUpdate>,
        records: Vec<NewTransaction>,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// All ledger entries owned by `owner_id`, newest first.
    fn list_by_owner(
        &self,
        owner_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<TransactionRecord>, StoreError>> + Send;
}
