use ledger_store::LedgerEntry;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAccountRequest {
    #[validate(length(min = 1, message = "owner must not be empty"))]
    pub owner: String,

    #[validate(length(min = 1, message = "currency must not be empty"))]
    pub currency: String,

    #[validate(range(min = 0, message = "initial_balance must not be negative"))]
    pub initial_balance: i64,
}

#[derive(Debug, Serialize)]
pub struct CreateAccountResponse {
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: i64,
}

#[derive(Debug, Serialize)]
pub struct LedgerResponse {
    pub entries: Vec<LedgerEntry>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TransactionRequest {
    pub account_id: Uuid,

    /// `deposit` or `withdraw`
    #[serde(rename = "type")]
    #[validate(custom = "validate_kind")]
    pub kind: String,

    #[validate(range(min = 1, message = "amount must be positive"))]
    pub amount: i64,

    pub idempotency_key: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_transfer"))]
pub struct TransferRequest {
    pub from_account_id: Uuid,

    pub to_account_id: Uuid,

    #[validate(range(min = 1, message = "amount must be positive"))]
    pub amount: i64,

    pub idempotency_key: Option<String>,
}

/// Accepted-for-processing acknowledgment; the key lets the client retry
/// safely and poll the ledger for the outcome.
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub status: &'static str,
    pub idempotency_key: String,
}

impl AcceptedResponse {
    pub fn queued(idempotency_key: String) -> Self {
        AcceptedResponse {
            status: "queued",
            idempotency_key,
        }
    }
}

fn validate_kind(kind: &str) -> Result<(), ValidationError> {
    match kind {
        "deposit" | "withdraw" => Ok(()),
        _ => Err(ValidationError::new("invalid_type")),
    }
}

fn validate_transfer(request: &TransferRequest) -> Result<(), ValidationError> {
    if request.from_account_id == request.to_account_id {
        return Err(ValidationError::new("same_account"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_account_request_validation() {
        let request = CreateAccountRequest {
            owner: "Alice".to_string(),
            currency: "USD".to_string(),
            initial_balance: 1000,
        };
        assert!(request.validate().is_ok());

        let request = CreateAccountRequest {
            owner: "".to_string(),
            currency: "USD".to_string(),
            initial_balance: 0,
        };
        assert!(request.validate().is_err());

        let request = CreateAccountRequest {
            owner: "Alice".to_string(),
            currency: "USD".to_string(),
            initial_balance: -1,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_transaction_request_validation() {
        let request = TransactionRequest {
            account_id: Uuid::new_v4(),
            kind: "deposit".to_string(),
            amount: 200,
            idempotency_key: None,
        };
        assert!(request.validate().is_ok());

        let request = TransactionRequest {
            account_id: Uuid::new_v4(),
            kind: "mint".to_string(),
            amount: 200,
            idempotency_key: None,
        };
        assert!(request.validate().is_err());

        let request = TransactionRequest {
            account_id: Uuid::new_v4(),
            kind: "withdraw".to_string(),
            amount: 0,
            idempotency_key: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_transfer_request_rejects_same_account() {
        let id = Uuid::new_v4();
        let request = TransferRequest {
            from_account_id: id,
            to_account_id: id,
            amount: 500,
            idempotency_key: None,
        };
        assert!(request.validate().is_err());

        let request = TransferRequest {
            from_account_id: Uuid::new_v4(),
            to_account_id: Uuid::new_v4(),
            amount: 500,
            idempotency_key: Some("t1".to_string()),
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_transaction_request_wire_field_names() {
        let body = serde_json::json!({
            "account_id": Uuid::new_v4(),
            "type": "deposit",
            "amount": 200,
        });

        let request: TransactionRequest = serde_json::from_value(body).unwrap();
        assert_eq!(request.kind, "deposit");
        assert!(request.idempotency_key.is_none());
    }
}
