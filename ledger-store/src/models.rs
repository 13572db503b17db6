use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One append-only history entry.
///
/// `amount` is signed: deposits and transfer credits are positive,
/// withdrawals and transfer debits are negative, so the entries for an
/// account sum to its balance delta since creation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LedgerEntry {
    pub account_id: Uuid,
    pub kind: String,
    pub amount: i64,
    pub balance_after: i64,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}
