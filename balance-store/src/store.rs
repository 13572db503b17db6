use crate::error::{Result, StoreError};
use crate::models::Account;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Pool, Postgres};
use std::time::Duration;
use uuid::Uuid;

pub struct BalanceStore {
    pool: Pool<Postgres>,
}

impl BalanceStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(BalanceStore { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create a new account with its opening balance
    pub async fn create_account(
        &self,
        owner: &str,
        currency: &str,
        initial_balance: i64,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO accounts (id, owner, currency, balance, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(currency)
        .bind(initial_balance)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    /// Get an account by id
    pub async fn get_account(&self, id: Uuid) -> Result<Account> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT id, owner, currency, balance, created_at FROM accounts WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::AccountNotFound(id))
    }

    /// Apply a deposit or withdrawal under the account row lock.
    ///
    /// The probe on `processed_messages` makes redelivery a no-op: a key
    /// that is already recorded short-circuits to the balance that single
    /// application produced, without taking the lock.
    pub async fn apply_transaction(
        &self,
        account_id: Uuid,
        kind: &str,
        amount: i64,
        key: &str,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let processed = sqlx::query_scalar::<_, String>(
            r#"
            SELECT idempotency_key FROM processed_messages WHERE idempotency_key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&mut *tx)
        .await?;

        if processed.is_some() {
            let balance = sqlx::query_scalar::<_, i64>(
                r#"
                SELECT balance FROM accounts WHERE id = $1
                "#,
            )
            .bind(account_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::AccountNotFound(account_id))?;

            tx.commit().await?;
            return Ok(balance);
        }

        let balance = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT balance FROM accounts WHERE id = $1 FOR UPDATE
            "#,
        )
        .bind(account_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::AccountNotFound(account_id))?;

        let balance = match kind {
            "deposit" => balance + amount,
            "withdraw" => {
                if balance < amount {
                    return Err(StoreError::InsufficientFunds {
                        balance,
                        requested: amount,
                    });
                }
                balance - amount
            }
            other => return Err(StoreError::InvalidType(other.to_string())),
        };

        sqlx::query(
            r#"
            UPDATE accounts SET balance = $1 WHERE id = $2
            "#,
        )
        .bind(balance)
        .bind(account_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO processed_messages (idempotency_key, account_id, type, amount, processed_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(key)
        .bind(account_id)
        .bind(kind)
        .bind(amount)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(balance)
    }

    /// Apply a transfer between two accounts.
    ///
    /// Row locks are taken in ascending id order so two concurrent
    /// transfers over the same pair in opposite directions cannot
    /// deadlock. The processed-key row records the source account.
    pub async fn apply_transfer(
        &self,
        from: Uuid,
        to: Uuid,
        amount: i64,
        key: &str,
    ) -> Result<(i64, i64)> {
        let mut tx = self.pool.begin().await?;

        let processed = sqlx::query_scalar::<_, String>(
            r#"
            SELECT idempotency_key FROM processed_messages WHERE idempotency_key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&mut *tx)
        .await?;

        if processed.is_some() {
            let from_balance = sqlx::query_scalar::<_, i64>(
                r#"
                SELECT balance FROM accounts WHERE id = $1
                "#,
            )
            .bind(from)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::AccountNotFound(from))?;

            let to_balance = sqlx::query_scalar::<_, i64>(
                r#"
                SELECT balance FROM accounts WHERE id = $1
                "#,
            )
            .bind(to)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::AccountNotFound(to))?;

            tx.commit().await?;
            return Ok((from_balance, to_balance));
        }

        let (first, second) = lock_order(from, to);

        let first_balance = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT balance FROM accounts WHERE id = $1 FOR UPDATE
            "#,
        )
        .bind(first)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::AccountNotFound(first))?;

        let second_balance = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT balance FROM accounts WHERE id = $1 FOR UPDATE
            "#,
        )
        .bind(second)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::AccountNotFound(second))?;

        let (from_balance, to_balance) = if first == from {
            (first_balance, second_balance)
        } else {
            (second_balance, first_balance)
        };

        if from_balance < amount {
            return Err(StoreError::InsufficientFunds {
                balance: from_balance,
                requested: amount,
            });
        }

        let from_balance = from_balance - amount;
        let to_balance = to_balance + amount;

        sqlx::query(
            r#"
            UPDATE accounts SET balance = $1 WHERE id = $2
            "#,
        )
        .bind(from_balance)
        .bind(from)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE accounts SET balance = $1 WHERE id = $2
            "#,
        )
        .bind(to_balance)
        .bind(to)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO processed_messages (idempotency_key, account_id, type, amount, processed_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(key)
        .bind(from)
        .bind("transfer")
        .bind(amount)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((from_balance, to_balance))
    }
}

/// Deterministic total order for transfer lock acquisition
fn lock_order(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_order_is_symmetric() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(lock_order(a, b), lock_order(b, a));
    }

    #[test]
    fn test_lock_order_is_ascending() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (first, second) = lock_order(a, b);
        assert!(first <= second);
    }

    #[test]
    fn test_lock_order_matches_canonical_string_order() {
        // Canonical lowercase-hex form sorts the same way as the raw
        // bytes, so the order is stable across representations.
        for _ in 0..64 {
            let a = Uuid::new_v4();
            let b = Uuid::new_v4();
            let (first, second) = lock_order(a, b);
            assert!(first.to_string() <= second.to_string());
        }
    }
}
