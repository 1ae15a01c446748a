//! Account number type
//!
//! The external 10-digit routing identifier printed on a user's profile and
//! used to address transfers. Distinct from the internal account id.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MIN_ACCOUNT_NUMBER: i64 = 1_000_000_000;
const MAX_ACCOUNT_NUMBER: i64 = 9_999_999_999;

/// A validated 10-digit account number in `[1_000_000_000, 9_999_999_999]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct AccountNumber(i64);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountNumberError {
    #[error("Account number must have exactly 10 digits (got {0})")]
    OutOfRange(i64),

    #[error("Invalid account number format: {0}")]
    ParseError(String),
}

impl AccountNumber {
    /// Validate a raw value as a 10-digit account number.
    pub fn new(value: i64) -> Result<Self, AccountNumberError> {
        if !(MIN_ACCOUNT_NUMBER..=MAX_ACCOUNT_NUMBER).contains(&value) {
            return Err(AccountNumberError::OutOfRange(value));
        }
        Ok(Self(value))
    }

    /// Draw a random candidate account number.
    ///
    /// Candidates are uniform over the full 10-digit range; uniqueness is the
    /// allocator's and the store's concern, not this function's.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self(rng.gen_range(MIN_ACCOUNT_NUMBER..=MAX_ACCOUNT_NUMBER))
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountNumber {
    type Err = AccountNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = i64::from_str(s).map_err(|e| AccountNumberError::ParseError(e.to_string()))?;
        Self::new(value)
    }
}

impl TryFrom<i64> for AccountNumber {
    type Error = AccountNumberError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccountNumber> for i64 {
    fn from(number: AccountNumber) -> Self {
        number.0
    }
}
