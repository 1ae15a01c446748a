//! Account number allocation
//!
//! Draws random 10-digit candidates and checks them against the store. The
//! existence check only keeps the retry count low; the store's unique
//! constraint on account_number is what actually prevents two concurrent
//! allocations from both claiming the same value.

use crate::domain::AccountNumber;
use crate::error::AppError;
use crate::store::LedgerStore;

/// Upper bound on random draws before giving up. With a 9-billion-value
/// space this only trips if the store is effectively full.
const MAX_ATTEMPTS: u32 = 20;

/// Candidate generator for external account numbers.
pub struct AccountNumberAllocator;

impl AccountNumberAllocator {
    /// Allocate an account number not currently present in the store.
    ///
    /// The returned number is only reserved once an account row is inserted
    /// with it; callers must treat `DuplicateAccountNumber` from the insert
    /// as a signal to allocate again.
    pub async fn allocate<S: LedgerStore>(store: &S) -> Result<AccountNumber, AppError> {
        for _ in 0..MAX_ATTEMPTS {
            // thread_rng handle must not be held across an await point
            let candidate = {
                let mut rng = rand::thread_rng();
                AccountNumber::random(&mut rng)
            };

            if store.find_by_account_number(candidate).await?.is_none() {
                return Ok(candidate);
            }

            tracing::debug!(%candidate, "account number collision, redrawing");
        }

        tracing::error!("exhausted {MAX_ATTEMPTS} account number draws");
        Err(AppError::AccountNumbersExhausted)
    }
}
