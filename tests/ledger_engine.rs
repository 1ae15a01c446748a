//! Ledger engine behavior tests
//!
//! Run against the in-memory store, so they need no database. Fault
//! injection goes through thin store wrappers; the `LedgerStore` seam makes
//! that cheap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use kudipay::domain::{AccountNumber, Amount, Balance, DomainError};
use kudipay::error::AppError;
use kudipay::ledger::{LedgerEngine, OpenAccount};
use kudipay::store::{
    Account, BalanceUpdate, LedgerStore, MemoryStore, NewAccount, NewTransaction, ProfileChanges,
    StoreError, TransactionKind, TransactionRecord,
};

async fn open(
    engine: &LedgerEngine<MemoryStore>,
    email: &str,
    balance_minor: i64,
) -> Account {
    engine
        .open_account(OpenAccount {
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            starting_balance: Balance::new(balance_minor).unwrap(),
        })
        .await
        .expect("open_account failed")
}

fn amount(minor: i64) -> Amount {
    Amount::new(minor).unwrap()
}

// =========================================================================
// Concrete scenarios
// =========================================================================

#[tokio::test]
async fn transfer_moves_funds_and_writes_both_legs() {
    let store = MemoryStore::new();
    let engine = LedgerEngine::new(store.clone());

    let a = open(&engine, "a@example.com", 100_000).await;
    let b = open(&engine, "b@example.com", 50_000).await;

    let receipt = engine
        .transfer(a.id, b.account_number, amount(30_000))
        .await
        .unwrap();
    assert_eq!(receipt.sender_balance.minor_units(), 70_000);
    assert_eq!(receipt.recipient_balance.minor_units(), 80_000);

    let a_after = store.find_by_identity(a.id).await.unwrap().unwrap();
    let b_after = store.find_by_identity(b.id).await.unwrap().unwrap();
    assert_eq!(a_after.balance.minor_units(), 70_000);
    assert_eq!(b_after.balance.minor_units(), 80_000);

    let a_history = engine.history(a.id).await.unwrap();
    assert_eq!(a_history.len(), 1);
    assert_eq!(a_history[0].kind, TransactionKind::Transfer);
    assert_eq!(a_history[0].amount.minor_units(), 30_000);
    assert_eq!(
        a_history[0].description,
        format!("Transfer to {}", b.account_number)
    );

    let b_history = engine.history(b.id).await.unwrap();
    assert_eq!(b_history.len(), 1);
    assert_eq!(
        b_history[0].description,
        format!("Received from {}", a.account_number)
    );
}

#[tokio::test]
async fn insufficient_funds_changes_nothing() {
    let store = MemoryStore::new();
    let engine = LedgerEngine::new(store.clone());

    let a = open(&engine, "a@example.com", 5_000).await;
    let b = open(&engine, "b@example.com", 50_000).await;

    let err = engine
        .transfer(a.id, b.account_number, amount(10_000))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Domain(DomainError::InsufficientFunds {
            required: 10_000,
            available: 5_000
        })
    ));

    let a_after = store.find_by_identity(a.id).await.unwrap().unwrap();
    let b_after = store.find_by_identity(b.id).await.unwrap().unwrap();
    assert_eq!(a_after.balance.minor_units(), 5_000);
    assert_eq!(b_after.balance.minor_units(), 50_000);
    assert!(engine.history(a.id).await.unwrap().is_empty());
    assert!(engine.history(b.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn airtime_can_drain_balance_to_zero_but_not_below() {
    let store = MemoryStore::new();
    let engine = LedgerEngine::new(store.clone());

    let a = open(&engine, "a@example.com", 100_000).await;

    let receipt = engine.airtime(a.id, amount(100_000), "MTN").await.unwrap();
    assert_eq!(receipt.balance.minor_units(), 0);

    let history = engine.history(a.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, TransactionKind::Airtime);
    assert_eq!(history[0].description, "Airtime purchase (MTN)");

    let err = engine.airtime(a.id, amount(1), "MTN").await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Domain(DomainError::InsufficientFunds { .. })
    ));
    assert_eq!(engine.history(a.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn self_transfer_is_rejected() {
    let store = MemoryStore::new();
    let engine = LedgerEngine::new(store.clone());

    let a = open(&engine, "a@example.com", 100_000).await;

    let err = engine
        .transfer(a.id, a.account_number, amount(1_000))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Domain(DomainError::SelfTransfer)));

    let a_after = store.find_by_identity(a.id).await.unwrap().unwrap();
    assert_eq!(a_after.balance.minor_units(), 100_000);
    assert!(engine.history(a.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_recipient_is_rejected() {
    let store = MemoryStore::new();
    let engine = LedgerEngine::new(store.clone());

    let a = open(&engine, "a@example.com", 100_000).await;
    let mut unknown = AccountNumber::new(9_999_999_998).unwrap();
    if unknown == a.account_number {
        unknown = AccountNumber::new(9_999_999_997).unwrap();
    }

    let err = engine
        .transfer(a.id, unknown, amount(1_000))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Domain(DomainError::RecipientNotFound(_))
    ));
}

// =========================================================================
// Properties
// =========================================================================

#[tokio::test]
async fn conservation_over_transfer_sequences() {
    let store = MemoryStore::new();
    let engine = LedgerEngine::new(store.clone());

    let accounts = vec![
        open(&engine, "a@example.com", 100_000).await,
        open(&engine, "b@example.com", 40_000).await,
        open(&engine, "c@example.com", 0).await,
    ];
    let total: i64 = accounts.iter().map(|a| a.balance.minor_units()).sum();

    // Mixed successes and rejections
    let moves = [
        (0usize, 1usize, 60_000),
        (1, 2, 90_000), // rejected: insufficient
        (1, 2, 70_000),
        (2, 0, 70_000),
        (0, 0, 1_000), // rejected: self transfer
        (2, 1, 1),     // rejected: insufficient
    ];

    for (from, to, minor) in moves {
        let _ = engine
            .transfer(accounts[from].id, accounts[to].account_number, amount(minor))
            .await;
    }

    let mut after = 0;
    for account in &accounts {
        after += store
            .find_by_identity(account.id)
            .await
            .unwrap()
            .unwrap()
            .balance
            .minor_units();
    }
    assert_eq!(after, total);
}

#[tokio::test]
async fn history_read_is_idempotent() {
    let store = MemoryStore::new();
    let engine = LedgerEngine::new(store.clone());

    let a = open(&engine, "a@example.com", 100_000).await;
    let b = open(&engine, "b@example.com", 0).await;
    engine
        .transfer(a.id, b.account_number, amount(10_000))
        .await
        .unwrap();
    engine.airtime(a.id, amount(5_000), "Glo").await.unwrap();

    let first = engine.history(a.id).await.unwrap();
    let second = engine.history(a.id).await.unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(first.len(), second.len());
    for (x, y) in first.iter().zip(second.iter()) {
        assert_eq!(x.id, y.id);
        assert_eq!(x.description, y.description);
        assert_eq!(x.created_at, y.created_at);
    }
    // Newest first
    assert_eq!(first[0].kind, TransactionKind::Airtime);
}

#[tokio::test]
async fn concurrent_debits_cannot_both_win_the_last_kobo() {
    let store = MemoryStore::new();
    let engine = LedgerEngine::new(store.clone());

    let a = open(&engine, "a@example.com", 100_000).await;
    let b = open(&engine, "b@example.com", 0).await;
    let c = open(&engine, "c@example.com", 0).await;

    // Both transfers want the full balance; at most one can have it.
    let e1 = engine.clone();
    let e2 = engine.clone();
    let (a1, a2) = (a.id, a.id);
    let (nb, nc) = (b.account_number, c.account_number);
    let t1 = tokio::spawn(async move { e1.transfer(a1, nb, amount(100_000)).await });
    let t2 = tokio::spawn(async move { e2.transfer(a2, nc, amount(100_000)).await });

    let r1 = t1.await.unwrap();
    let r2 = t2.await.unwrap();

    let successes = [r1.is_ok(), r2.is_ok()].iter().filter(|&&s| s).count();
    assert_eq!(successes, 1, "exactly one transfer must win");

    for result in [r1, r2] {
        if let Err(err) = result {
            assert!(
                matches!(
                    err,
                    AppError::Domain(DomainError::InsufficientFunds { .. }) | AppError::Busy
                ),
                "loser must fail with InsufficientFunds or Busy, got {err:?}"
            );
        }
    }

    let a_after = store.find_by_identity(a.id).await.unwrap().unwrap();
    assert_eq!(a_after.balance.minor_units(), 0);

    let b_after = store.find_by_identity(b.id).await.unwrap().unwrap();
    let c_after = store.find_by_identity(c.id).await.unwrap().unwrap();
    assert_eq!(
        b_after.balance.minor_units() + c_after.balance.minor_units(),
        100_000
    );

    // The losing transfer must not have logged anything.
    assert_eq!(engine.history(a.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn conservation_under_concurrent_crossing_transfers() {
    let store = MemoryStore::new();
    let engine = LedgerEngine::new(store.clone());

    let a = open(&engine, "a@example.com", 50_000).await;
    let b = open(&engine, "b@example.com", 50_000).await;

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..20 {
        let engine = engine.clone();
        let (from, to) = if i % 2 == 0 {
            (a.id, b.account_number)
        } else {
            (b.id, a.account_number)
        };
        tasks.spawn(async move { engine.transfer(from, to, amount(1_000)).await });
    }

    let mut committed = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(_) => committed += 1,
            // Under heavy contention a task may exhaust its retries
            Err(AppError::Busy) => {}
            Err(other) => panic!("unexpected failure: {other:?}"),
        }
    }

    let a_after = store.find_by_identity(a.id).await.unwrap().unwrap();
    let b_after = store.find_by_identity(b.id).await.unwrap().unwrap();
    assert_eq!(
        a_after.balance.minor_units() + b_after.balance.minor_units(),
        100_000
    );

    // Every committed transfer wrote exactly two legs.
    let records = engine.history(a.id).await.unwrap().len()
        + engine.history(b.id).await.unwrap().len();
    assert_eq!(records, committed * 2);
}

// =========================================================================
// Fault injection
// =========================================================================

/// Delegating store whose commit can be switched to fail.
#[derive(Clone)]
struct FailingStore {
    inner: MemoryStore,
    fail_commits: Arc<AtomicBool>,
}

impl FailingStore {
    fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_commits: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl LedgerStore for FailingStore {
    async fn find_by_identity(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        self.inner.find_by_identity(id).await
    }

    async fn find_by_account_number(
        &self,
        number: AccountNumber,
    ) -> Result<Option<Account>, StoreError> {
        self.inner.find_by_account_number(number).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        self.inner.find_by_email(email).await
    }

    async fn create_account(&self, new: NewAccount) -> Result<Account, StoreError> {
        self.inner.create_account(new).await
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> Result<Account, StoreError> {
        self.inner.update_profile(id, changes).await
    }

    async fn commit(
        &self,
        updates: Vec<BalanceUpdate>,
        records: Vec<NewTransaction>,
    ) -> Result<(), StoreError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Corrupt("injected commit failure".to_string()));
        }
        self.inner.commit(updates, records).await
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<TransactionRecord>, StoreError> {
        self.inner.list_by_owner(owner_id).await
    }
}

/// Delegating store whose commit always reports a version conflict.
#[derive(Clone)]
struct AlwaysConflictingStore {
    inner: MemoryStore,
}

impl LedgerStore for AlwaysConflictingStore {
    async fn find_by_identity(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        self.inner.find_by_identity(id).await
    }

    async fn find_by_account_number(
        &self,
        number: AccountNumber,
    ) -> Result<Option<Account>, StoreError> {
        self.inner.find_by_account_number(number).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        self.inner.find_by_email(email).await
    }

    async fn create_account(&self, new: NewAccount) -> Result<Account, StoreError> {
        self.inner.create_account(new).await
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> Result<Account, StoreError> {
        self.inner.update_profile(id, changes).await
    }

    async fn commit(
        &self,
        updates: Vec<BalanceUpdate>,
        _records: Vec<NewTransaction>,
    ) -> Result<(), StoreError> {
        Err(StoreError::Conflict {
            account_id: updates[0].account_id,
        })
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<TransactionRecord>, StoreError> {
        self.inner.list_by_owner(owner_id).await
    }
}

#[tokio::test]
async fn failed_commit_leaves_no_partial_state() {
    let memory = MemoryStore::new();
    let store = FailingStore::new(memory.clone());
    let engine = LedgerEngine::new(store.clone());

    let a = engine
        .open_account(OpenAccount {
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            email: "a@example.com".to_string(),
            password_hash: "hash".to_string(),
            starting_balance: Balance::new(100_000).unwrap(),
        })
        .await
        .unwrap();
    let b = engine
        .open_account(OpenAccount {
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            email: "b@example.com".to_string(),
            password_hash: "hash".to_string(),
            starting_balance: Balance::new(50_000).unwrap(),
        })
        .await
        .unwrap();

    store.fail_commits.store(true, Ordering::SeqCst);

    let err = engine
        .transfer(a.id, b.account_number, amount(30_000))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Store(StoreError::Corrupt(_))));

    // Neither balance moved, nothing was logged.
    let a_after = memory.find_by_identity(a.id).await.unwrap().unwrap();
    let b_after = memory.find_by_identity(b.id).await.unwrap().unwrap();
    assert_eq!(a_after.balance.minor_units(), 100_000);
    assert_eq!(b_after.balance.minor_units(), 50_000);
    assert!(memory.list_by_owner(a.id).await.unwrap().is_empty());
    assert!(memory.list_by_owner(b.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn conflict_retries_exhaust_into_busy() {
    let memory = MemoryStore::new();
    let setup_engine = LedgerEngine::new(memory.clone());
    let a = open(&setup_engine, "a@example.com", 100_000).await;
    let b = open(&setup_engine, "b@example.com", 0).await;

    let engine = LedgerEngine::new(AlwaysConflictingStore { inner: memory.clone() });
    let err = engine
        .transfer(a.id, b.account_number, amount(1_000))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Busy));

    let a_after = memory.find_by_identity(a.id).await.unwrap().unwrap();
    assert_eq!(a_after.balance.minor_units(), 100_000);
    assert!(memory.list_by_owner(a.id).await.unwrap().is_empty());
}

// =========================================================================
// Allocation
// =========================================================================

#[tokio::test]
async fn concurrent_signups_never_share_an_account_number() {
    let store = MemoryStore::new();
    let engine = LedgerEngine::new(store.clone());

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..1_000 {
        let engine = engine.clone();
        tasks.spawn(async move {
            engine
                .open_account(OpenAccount {
                    first_name: "Test".to_string(),
                    last_name: "User".to_string(),
                    email: format!("user{i}@example.com"),
                    password_hash: "hash".to_string(),
                    starting_balance: Balance::zero(),
                })
                .await
        });
    }

    let mut numbers = std::collections::HashSet::new();
    while let Some(result) = tasks.join_next().await {
        let account = result.unwrap().expect("signup failed");
        assert!(
            numbers.insert(account.account_number),
            "duplicate account number {}",
            account.account_number
        );
    }
    assert_eq!(numbers.len(), 1_000);
}
