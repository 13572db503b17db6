use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An account row. The balance is in minor units and is only ever mutated
/// by the apply operations under the row lock.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub owner: String,
    pub currency: String,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}
