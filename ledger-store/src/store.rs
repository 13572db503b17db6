use crate::error::Result;
use crate::models::LedgerEntry;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Pool, Postgres};
use std::time::Duration;
use uuid::Uuid;

pub struct LedgerStore {
    pool: Pool<Postgres>,
}

impl LedgerStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(LedgerStore { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Append one entry.
    ///
    /// `amount` is already signed by the caller. The conflict clause on
    /// (idempotency_key, account_id) makes re-execution after a retried
    /// delivery a no-op.
    pub async fn append(
        &self,
        account_id: Uuid,
        kind: &str,
        amount: i64,
        balance_after: i64,
        key: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ledger_entries (id, account_id, kind, amount, balance_after, idempotency_key, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (idempotency_key, account_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(account_id)
        .bind(kind)
        .bind(amount)
        .bind(balance_after)
        .bind(key)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Append the debit/credit pair for a transfer.
    ///
    /// Both rows share the idempotency key and are written in one
    /// transaction, so the pair lands atomically and re-execution
    /// converges even after a partial failure.
    pub async fn append_transfer(
        &self,
        from: Uuid,
        to: Uuid,
        amount: i64,
        from_after: i64,
        to_after: i64,
        key: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO ledger_entries (id, account_id, kind, amount, balance_after, idempotency_key, created_at)
            VALUES ($1, $2, 'transfer_debit', $3, $4, $5, $6)
            ON CONFLICT (idempotency_key, account_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(from)
        .bind(-amount)
        .bind(from_after)
        .bind(key)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO ledger_entries (id, account_id, kind, amount, balance_after, idempotency_key, created_at)
            VALUES ($1, $2, 'transfer_credit', $3, $4, $5, $6)
            ON CONFLICT (idempotency_key, account_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(to)
        .bind(amount)
        .bind(to_after)
        .bind(key)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Most recent entries for an account, newest first
    pub async fn recent(&self, account_id: Uuid, limit: i64) -> Result<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT account_id, kind, amount, balance_after, idempotency_key, created_at
            FROM ledger_entries
            WHERE account_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
