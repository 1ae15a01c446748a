//! Ledger Engine
//!
//! Orchestrates transfers and airtime debits against the account store and
//! transaction log. Each operation is read-validate-commit: balances are
//! recomputed from a fresh read, and the commit is conditional on the
//! version stamps seen at read time. A lost race surfaces as a store
//! conflict and the whole operation is retried from the read.

use std::time::Duration;

use uuid::Uuid;

use crate::domain::{AccountNumber, Amount, Balance, DomainError};
use crate::error::AppError;
use crate::store::{
    Account, BalanceUpdate, LedgerStore, NewAccount, NewTransaction, StoreError, TransactionKind,
    TransactionRecord,
};

use super::AccountNumberAllocator;

/// Attempts per operation before giving up with `Busy`.
const MAX_COMMIT_ATTEMPTS: u32 = 4;

/// Attempts to insert a freshly numbered account before giving up. Each
/// retry implies the allocator lost an insert race, which is already rare.
const MAX_CREATE_ATTEMPTS: u32 = 3;

/// Parameters for opening an account at signup.
#[derive(Debug, Clone)]
pub struct OpenAccount {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub starting_balance: Balance,
}

/// Result of a committed transfer.
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub sender_id: Uuid,
    pub recipient_account_number: AccountNumber,
    pub amount: Amount,
    pub sender_balance: Balance,
    pub recipient_balance: Balance,
}

/// Result of a committed airtime debit.
#[derive(Debug, Clone)]
pub struct AirtimeReceipt {
    pub account_id: Uuid,
    pub amount: Amount,
    pub network: String,
    pub balance: Balance,
}

/// The account ledger and transfer engine.
#[derive(Debug, Clone)]
pub struct LedgerEngine<S> {
    store: S,
}

impl<S: LedgerStore> LedgerEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Open a new account with a freshly allocated account number.
    pub async fn open_account(&self, request: OpenAccount) -> Result<Account, AppError> {
        // Pre-check gives the friendly error; the unique constraint on email
        // is what holds under a signup race.
        if self.store.find_by_email(&request.email).await?.is_some() {
            return Err(AppError::EmailTaken);
        }

        for attempt in 0..MAX_CREATE_ATTEMPTS {
            let account_number = AccountNumberAllocator::allocate(&self.store).await?;

            let new = NewAccount {
                id: Uuid::new_v4(),
                first_name: request.first_name.clone(),
                last_name: request.last_name.clone(),
                email: request.email.clone(),
                password_hash: request.password_hash.clone(),
                account_number,
                balance: request.starting_balance,
            };

            match self.store.create_account(new).await {
                Ok(account) => {
                    tracing::info!(
                        account_id = %account.id,
                        %account_number,
                        "account opened"
                    );
                    return Ok(account);
                }
                Err(StoreError::DuplicateAccountNumber) => {
                    tracing::warn!(
                        %account_number,
                        attempt,
                        "lost account number insert race, reallocating"
                    );
                    continue;
                }
                Err(StoreError::DuplicateEmail) => return Err(AppError::EmailTaken),
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::AccountNumbersExhausted)
    }

    /// Move `amount` from the sender to the account addressed by
    /// `recipient`. Debit, credit, and both log entries commit atomically.
    pub async fn transfer(
        &self,
        sender_id: Uuid,
        recipient: AccountNumber,
        amount: Amount,
    ) -> Result<TransferReceipt, AppError> {
        for attempt in 0..MAX_COMMIT_ATTEMPTS {
            let sender = self
                .store
                .find_by_identity(sender_id)
                .await?
                .ok_or_else(|| DomainError::AccountNotFound(sender_id.to_string()))?;

            let receiver = self
                .store
                .find_by_account_number(recipient)
                .await?
                .ok_or_else(|| DomainError::RecipientNotFound(recipient.to_string()))?;

            if sender.id == receiver.id {
                return Err(DomainError::SelfTransfer.into());
            }

            let sender_balance = sender.balance.debit(&amount).map_err(|_| {
                DomainError::insufficient_funds(amount.minor_units(), sender.balance.minor_units())
            })?;
            let recipient_balance = receiver
                .balance
                .credit(&amount)
                .map_err(|_| DomainError::BalanceOverflow)?;

            let mut updates = vec![
                BalanceUpdate {
                    account_id: sender.id,
                    new_balance: sender_balance,
                    expected_version: sender.version,
                },
                BalanceUpdate {
                    account_id: receiver.id,
                    new_balance: recipient_balance,
                    expected_version: receiver.version,
                },
            ];
            // Stable write order: opposing transfers on the same pair then
            // touch the rows in the same sequence and cannot deadlock.
            updates.sort_by_key(|u| u.account_id);

            let records = vec![
                NewTransaction {
                    owner_id: sender.id,
                    kind: TransactionKind::Transfer,
                    amount,
                    description: format!("Transfer to {recipient}"),
                },
                NewTransaction {
                    owner_id: receiver.id,
                    kind: TransactionKind::Transfer,
                    amount,
                    description: format!("Received from {}", sender.account_number),
                },
            ];

            match self.store.commit(updates, records).await {
                Ok(()) => {
                    tracing::info!(
                        sender = %sender.id,
                        receiver = %receiver.id,
                        amount = amount.minor_units(),
                        "transfer committed"
                    );
                    return Ok(TransferReceipt {
                        sender_id,
                        recipient_account_number: recipient,
                        amount,
                        sender_balance,
                        recipient_balance,
                    });
                }
                Err(e) if e.is_conflict() => {
                    self.backoff_or_bail(attempt, "transfer").await?;
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Busy)
    }

    /// Debit `amount` from the account for an airtime purchase. Balance
    /// mutation and the single log entry commit atomically.
    pub async fn airtime(
        &self,
        account_id: Uuid,
        amount: Amount,
        network: &str,
    ) -> Result<AirtimeReceipt, AppError> {
        for attempt in 0..MAX_COMMIT_ATTEMPTS {
            let account = self
                .store
                .find_by_identity(account_id)
                .await?
                .ok_or_else(|| DomainError::AccountNotFound(account_id.to_string()))?;

            let balance = account.balance.debit(&amount).map_err(|_| {
                DomainError::insufficient_funds(
                    amount.minor_units(),
                    account.balance.minor_units(),
                )
            })?;

            let updates = vec![BalanceUpdate {
                account_id: account.id,
                new_balance: balance,
                expected_version: account.version,
            }];
            let records = vec![NewTransaction {
                owner_id: account.id,
                kind: TransactionKind::Airtime,
                amount,
                description: format!("Airtime purchase ({network})"),
            }];

            match self.store.commit(updates, records).await {
                Ok(()) => {
                    tracing::info!(
                        account = %account.id,
                        amount = amount.minor_units(),
                        network,
                        "airtime debit committed"
                    );
                    return Ok(AirtimeReceipt {
                        account_id,
                        amount,
                        network: network.to_string(),
                        balance,
                    });
                }
                Err(e) if e.is_conflict() => {
                    self.backoff_or_bail(attempt, "airtime").await?;
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Busy)
    }

    /// All transaction records owned by `account_id`, newest first.
    /// Pure read; no mutation.
    pub async fn history(&self, account_id: Uuid) -> Result<Vec<TransactionRecord>, AppError> {
        Ok(self.store.list_by_owner(account_id).await?)
    }

    /// Look up the caller's account.
    pub async fn account(&self, account_id: Uuid) -> Result<Account, AppError> {
        self.store
            .find_by_identity(account_id)
            .await?
            .ok_or_else(|| DomainError::AccountNotFound(account_id.to_string()).into())
    }

    async fn backoff_or_bail(&self, attempt: u32, operation: &str) -> Result<(), AppError> {
        if attempt + 1 >= MAX_COMMIT_ATTEMPTS {
            tracing::warn!(operation, "conflict retries exhausted");
            return Err(AppError::Busy);
        }
        let delay = Duration::from_millis(25 * (attempt as u64 + 1));
        tracing::warn!(
            operation,
            attempt = attempt + 1,
            max = MAX_COMMIT_ATTEMPTS,
            "commit conflict, retrying"
        );
        tokio::time::sleep(delay).await;
        Ok(())
    }
}
