//! PostgreSQL store
//!
//! sqlx-backed implementation of [`LedgerStore`]. Balance writes are
//! conditional on the account version and run inside a single transaction
//! together with the ledger-entry inserts, so a transfer either lands in full
//! or not at all.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{AccountNumber, Amount, Balance};

use super::{
    Account, BalanceUpdate, LedgerStore, NewAccount, NewTransaction, ProfileChanges, StoreError,
    TransactionRecord,
};

type AccountRow = (
    Uuid,
    String,
    String,
    String,
    String,
    i64,
    i64,
    i64,
    DateTime<Utc>,
    DateTime<Utc>,
);

const ACCOUNT_COLUMNS: &str = "id, first_name, last_name, email, password_hash, \
     account_number, balance, version, created_at, updated_at";

/// PostgreSQL-backed account store and transaction log.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn account_from_row(row: AccountRow) -> Result<Account, StoreError> {
        let (
            id,
            first_name,
            last_name,
            email,
            password_hash,
            account_number,
            balance,
            version,
            created_at,
            updated_at,
        ) = row;

        Ok(Account {
            id,
            first_name,
            last_name,
            email,
            password_hash,
            account_number: AccountNumber::new(account_number)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?,
            balance: Balance::new(balance).map_err(|e| StoreError::Corrupt(e.to_string()))?,
            version,
            created_at,
            updated_at,
        })
    }

    fn map_unique_violation(err: sqlx::Error) -> StoreError {
        if let sqlx::Error::Database(ref db_err) = err {
            match db_err.constraint() {
                Some("accounts_email_key") => return StoreError::DuplicateEmail,
                Some("accounts_account_number_key") => {
                    return StoreError::DuplicateAccountNumber
                }
                _ => {}
            }
        }
        StoreError::Database(err)
    }
}

impl LedgerStore for PgStore {
    async fn find_by_identity(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        let row: Option<AccountRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::account_from_row).transpose()
    }

    async fn find_by_account_number(
        &self,
        number: AccountNumber,
    ) -> Result<Option<Account>, StoreError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_number = $1");
        let row: Option<AccountRow> = sqlx::query_as(&query)
            .bind(number.value())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::account_from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1");
        let row: Option<AccountRow> = sqlx::query_as(&query)
            .bind(email.to_owned())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::account_from_row).transpose()
    }

    async fn create_account(&self, new: NewAccount) -> Result<Account, StoreError> {
        let query = format!(
            r#"
            INSERT INTO accounts (
                id, first_name, last_name, email, password_hash,
                account_number, balance, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 1)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        );

        let row: AccountRow = sqlx::query_as(&query)
            .bind(new.id)
            .bind(&new.first_name)
            .bind(&new.last_name)
            .bind(&new.email)
            .bind(&new.password_hash)
            .bind(new.account_number.value())
            .bind(new.balance.minor_units())
            .fetch_one(&self.pool)
            .await
            .map_err(Self::map_unique_violation)?;

        Self::account_from_row(row)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> Result<Account, StoreError> {
        let query = format!(
            r#"
            UPDATE accounts
            SET first_name = COALESCE($2, first_name),
                last_name  = COALESCE($3, last_name),
                email      = COALESCE($4, email),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        );

        let row: Option<AccountRow> = sqlx::query_as(&query)
            .bind(id)
            .bind(changes.first_name)
            .bind(changes.last_name)
            .bind(changes.email)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::map_unique_violation)?;

        match row {
            Some(row) => Self::account_from_row(row),
            None => Err(StoreError::Corrupt(format!("account {id} vanished"))),
        }
    }

    async fn commit(
        &self,
        updates: Vec<BalanceUpdate>,
        records: Vec<NewTransaction>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for update in &updates {
            let affected = sqlx::query(
                r#"
                UPDATE accounts
                SET balance = $1, version = version + 1, updated_at = NOW()
                WHERE id = $2 AND version = $3
                "#,
            )
            .bind(update.new_balance.minor_units())
            .bind(update.account_id)
            .bind(update.expected_version)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            // 0 rows means the version moved under us; dropping the
            // transaction rolls back any earlier update in this batch.
            if affected == 0 {
                return Err(StoreError::Conflict {
                    account_id: update.account_id,
                });
            }
        }

        for record in &records {
            sqlx::query(
                r#"
                INSERT INTO transactions (id, owner_id, kind, amount, description)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(record.owner_id)
            .bind(record.kind.as_str())
            .bind(record.amount.minor_units())
            .bind(&record.description)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<TransactionRecord>, StoreError> {
        let rows: Vec<(Uuid, Uuid, String, i64, String, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT id, owner_id, kind, amount, description, created_at
            FROM transactions
            WHERE owner_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, owner_id, kind, amount, description, created_at)| {
                Ok(TransactionRecord {
                    id,
                    owner_id,
                    kind: kind.parse()?,
                    amount: Amount::new(amount).map_err(|e| StoreError::Corrupt(e.to_string()))?,
                    description,
                    created_at,
                })
            })
            .collect()
    }
}
