//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;

/// Business rule violations and domain invariant failures.
/// Independent of the web/persistence layers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Amount failed validation (zero, negative, or out of range)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Insufficient funds for a debit operation
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    /// Authenticated caller has no account (stale token, deleted record)
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Transfer recipient account number does not exist
    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),

    /// Transfer where sender and recipient are the same account
    #[error("Cannot transfer to your own account")]
    SelfTransfer,

    /// Crediting the recipient would push the balance past the cap
    #[error("Balance limit exceeded")]
    BalanceOverflow,
}

impl DomainError {
    /// Create an insufficient funds error
    pub fn insufficient_funds(required: i64, available: i64) -> Self {
        Self::InsufficientFunds {
            required,
            available,
        }
    }

    /// Check if this is a client error (user's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount(_)
                | Self::InsufficientFunds { .. }
                | Self::RecipientNotFound(_)
                | Self::SelfTransfer
                | Self::BalanceOverflow
        )
    }
}
