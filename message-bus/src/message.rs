//! Wire payloads for the transaction stream
//!
//! Two message shapes share one subject. Consumers discriminate by field
//! presence: a transfer carries `from_account_id` and `to_account_id`, a
//! single-account transaction carries `account_id`. A payload carrying
//! fields of both shapes is ambiguous and is rejected rather than guessed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Single-account transaction (deposit or withdraw)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxMessage {
    /// Target account
    pub account_id: Uuid,

    /// Operation kind: `deposit` or `withdraw`
    #[serde(rename = "type")]
    pub kind: String,

    /// Amount in minor units; always positive on the wire
    pub amount: i64,

    /// Dedup token spanning intake, transport and worker
    pub idempotency_key: String,

    /// Stamped by intake at enqueue time
    pub created_at: DateTime<Utc>,
}

/// Two-account transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferMessage {
    /// Account debited
    pub from_account_id: Uuid,

    /// Account credited
    pub to_account_id: Uuid,

    /// Amount in minor units; always positive on the wire
    pub amount: i64,

    /// Dedup token spanning intake, transport and worker
    pub idempotency_key: String,

    /// Stamped by intake at enqueue time
    pub created_at: DateTime<Utc>,
}

/// A delivery classified into one of the two wire shapes
#[derive(Debug)]
pub enum QueuedOp {
    /// Deposit or withdraw on a single account
    Transaction(TxMessage),

    /// Transfer between two accounts
    Transfer(TransferMessage),
}

/// Why a payload could not be classified
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassifyError {
    /// Payload is not a JSON object
    #[error("payload is not a JSON object")]
    NotAnObject,

    /// Payload carries both single-account and transfer fields
    #[error("payload carries both single-account and transfer fields")]
    Ambiguous,

    /// Payload matches neither wire shape
    #[error("payload matches no known message shape: {0}")]
    Unknown(String),
}

/// Classify a raw payload into one of the two wire shapes.
///
/// The single-account shape is tried first, then the transfer shape,
/// matching the order the fields are probed in.
pub fn classify(payload: &[u8]) -> std::result::Result<QueuedOp, ClassifyError> {
    let value: serde_json::Value =
        serde_json::from_slice(payload).map_err(|e| ClassifyError::Unknown(e.to_string()))?;
    let object = value.as_object().ok_or(ClassifyError::NotAnObject)?;

    let single = object.contains_key("account_id");
    let transfer = object.contains_key("from_account_id") || object.contains_key("to_account_id");

    if single && transfer {
        return Err(ClassifyError::Ambiguous);
    }
    if single {
        return serde_json::from_value(value)
            .map(QueuedOp::Transaction)
            .map_err(|e| ClassifyError::Unknown(e.to_string()));
    }
    if transfer {
        return serde_json::from_value(value)
            .map(QueuedOp::Transfer)
            .map_err(|e| ClassifyError::Unknown(e.to_string()));
    }
    Err(ClassifyError::Unknown("no account fields present".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn test_classify_transaction() {
        let body = payload(json!({
            "account_id": "3fa09a6e-1d53-4f61-b8a4-1f2ad1a8a6a9",
            "type": "deposit",
            "amount": 200,
            "idempotency_key": "k1",
            "created_at": "2024-05-01T12:00:00Z",
        }));

        match classify(&body).unwrap() {
            QueuedOp::Transaction(tx) => {
                assert_eq!(tx.kind, "deposit");
                assert_eq!(tx.amount, 200);
                assert_eq!(tx.idempotency_key, "k1");
            }
            other => panic!("expected transaction, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_transfer() {
        let body = payload(json!({
            "from_account_id": "3fa09a6e-1d53-4f61-b8a4-1f2ad1a8a6a9",
            "to_account_id": "7c2b1a90-4c1f-4d8e-9f30-52b8f3a9e011",
            "amount": 500,
            "idempotency_key": "t1",
            "created_at": "2024-05-01T12:00:00Z",
        }));

        match classify(&body).unwrap() {
            QueuedOp::Transfer(tr) => {
                assert_eq!(tr.amount, 500);
                assert_eq!(tr.idempotency_key, "t1");
            }
            other => panic!("expected transfer, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_rejects_ambiguous_payload() {
        let body = payload(json!({
            "account_id": "3fa09a6e-1d53-4f61-b8a4-1f2ad1a8a6a9",
            "from_account_id": "7c2b1a90-4c1f-4d8e-9f30-52b8f3a9e011",
            "to_account_id": "7c2b1a90-4c1f-4d8e-9f30-52b8f3a9e011",
            "amount": 500,
        }));

        assert_eq!(classify(&body).unwrap_err(), ClassifyError::Ambiguous);
    }

    #[test]
    fn test_classify_rejects_unknown_shape() {
        let body = payload(json!({"amount": 500, "idempotency_key": "k"}));
        assert!(matches!(
            classify(&body).unwrap_err(),
            ClassifyError::Unknown(_)
        ));
    }

    #[test]
    fn test_classify_rejects_non_object() {
        assert_eq!(
            classify(b"[1, 2, 3]").unwrap_err(),
            ClassifyError::NotAnObject
        );
    }

    #[test]
    fn test_classify_rejects_malformed_account_id() {
        let body = payload(json!({
            "account_id": "not-a-uuid",
            "type": "deposit",
            "amount": 1,
            "idempotency_key": "k",
            "created_at": "2024-05-01T12:00:00Z",
        }));

        assert!(matches!(
            classify(&body).unwrap_err(),
            ClassifyError::Unknown(_)
        ));
    }

    #[test]
    fn test_tx_message_wire_field_names() {
        let msg = TxMessage {
            account_id: Uuid::nil(),
            kind: "withdraw".to_string(),
            amount: 100,
            idempotency_key: "k2".to_string(),
            created_at: Utc::now(),
        };

        let value: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "withdraw");
        assert!(value.get("kind").is_none());
    }
}
