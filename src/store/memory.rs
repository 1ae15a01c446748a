//! In-memory store
//!
//! [`LedgerStore`] implementation over a single mutex-guarded map. Commit
//! atomicity comes from mutual exclusion: version checks and writes happen
//! under one lock acquisition. Used by the engine tests; also handy for
//! local experiments without a database.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::AccountNumber;

use super::{
    Account, BalanceUpdate, LedgerStore, NewAccount, NewTransaction, ProfileChanges, StoreError,
    TransactionRecord,
};

#[derive(Debug, Default)]
struct Inner {
    accounts: HashMap<Uuid, Account>,
    transactions: Vec<TransactionRecord>,
}

/// Mutex-guarded in-memory account store and transaction log.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryStore {
    async fn find_by_identity(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.accounts.get(&id).cloned())
    }

    async fn find_by_account_number(
        &self,
        number: AccountNumber,
    ) -> Result<Option<Account>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .accounts
            .values()
            .find(|a| a.account_number == number)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.accounts.values().find(|a| a.email == email).cloned())
    }

    async fn create_account(&self, new: NewAccount) -> Result<Account, StoreError> {
        let mut inner = self.inner.lock().await;

        if inner.accounts.values().any(|a| a.email == new.email) {
            return Err(StoreError::DuplicateEmail);
        }
        if inner
            .accounts
            .values()
            .any(|a| a.account_number == new.account_number)
        {
            return Err(StoreError::DuplicateAccountNumber);
        }

        let now = Utc::now();
        let account = Account {
            id: new.id,
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            password_hash: new.password_hash,
            account_number: new.account_number,
            balance: new.balance,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        inner.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> Result<Account, StoreError> {
        let mut inner = self.inner.lock().await;

        if let Some(ref email) = changes.email {
            if inner
                .accounts
                .values()
                .any(|a| a.id != id && a.email == *email)
            {
                return Err(StoreError::DuplicateEmail);
            }
        }

        let account = inner
            .accounts
            .get_mut(&id)
            .ok_or_else(|| StoreError::Corrupt(format!("account {id} vanished")))?;

        if let Some(first_name) = changes.first_name {
            account.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            account.last_name = last_name;
        }
        if let Some(email) = changes.email {
            account.email = email;
        }
        account.updated_at = Utc::now();

        Ok(account.clone())
    }

    async fn commit(
        &self,
        updates: Vec<BalanceUpdate>,
        records: Vec<NewTransaction>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;

        // Validate every version stamp before touching anything.
        for update in &updates {
            let account = inner.accounts.get(&update.account_id).ok_or_else(|| {
                StoreError::Corrupt(format!("account {} vanished", update.account_id))
            })?;
            if account.version != update.expected_version {
                return Err(StoreError::Conflict {
                    account_id: update.account_id,
                });
            }
        }

        let now = Utc::now();
        for update in &updates {
            let account = inner
                .accounts
                .get_mut(&update.account_id)
                .expect("validated above");
            account.balance = update.new_balance;
            account.version += 1;
            account.updated_at = now;
        }

        for record in records {
            let entry = TransactionRecord {
                id: Uuid::new_v4(),
                owner_id: record.owner_id,
                kind: record.kind,
                amount: record.amount,
                description: record.description,
                created_at: now,
            };
            inner.transactions.push(entry);
        }

        Ok(())
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<TransactionRecord>, StoreError> {
        let inner = self.inner.lock().await;
        let mut records: Vec<TransactionRecord> = inner
            .transactions
            .iter()
            .filter(|t| t.owner_id == owner_id)
            .cloned()
            .collect();
        // Newest first; insertion order breaks timestamp ties.
        records.reverse();
        Ok(records)
    }
}
