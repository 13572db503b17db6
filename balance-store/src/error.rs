use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("insufficient_funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: i64, requested: i64 },

    #[error("invalid_account_id: {0}")]
    AccountNotFound(Uuid),

    #[error("invalid_type: {0}")]
    InvalidType(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Permanent errors fail identically on every retry; transient ones may
    /// succeed after redelivery. This split drives the worker's choice
    /// between dead-lettering and requeueing.
    ///
    /// Database errors are transient as a class. That includes the
    /// unique-constraint race on the processed-key insert: the loser rolls
    /// back, and its redelivery lands on the replay path.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            StoreError::InsufficientFunds { .. }
                | StoreError::AccountNotFound(_)
                | StoreError::InvalidType(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_errors_are_permanent() {
        assert!(StoreError::InsufficientFunds {
            balance: 100,
            requested: 10_000
        }
        .is_permanent());
        assert!(StoreError::AccountNotFound(Uuid::new_v4()).is_permanent());
        assert!(StoreError::InvalidType("mint".to_string()).is_permanent());
    }

    #[test]
    fn test_database_errors_are_transient() {
        assert!(!StoreError::Database(sqlx::Error::PoolTimedOut).is_permanent());
        assert!(!StoreError::Database(sqlx::Error::WorkerCrashed).is_permanent());
    }

    #[test]
    fn test_error_messages_carry_the_failure_identifier() {
        let err = StoreError::InsufficientFunds {
            balance: 100,
            requested: 200,
        };
        assert!(err.to_string().starts_with("insufficient_funds"));

        let err = StoreError::InvalidType("mint".to_string());
        assert!(err.to_string().starts_with("invalid_type"));
    }
}
