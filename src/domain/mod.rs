//! Domain module
//!
//! Core domain types and business rules.

pub mod account_number;
pub mod amount;
pub mod error;

pub use account_number::{AccountNumber, AccountNumberError};
pub use amount::{Amount, AmountError, Balance};
pub use error::DomainError;
