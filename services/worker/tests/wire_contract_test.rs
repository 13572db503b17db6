// Wire contract between intake and worker: the payloads the API service
// publishes must classify back into the same operation on the consumer
// side, and the classifier must hold the documented rejection rules for
// payloads produced by other writers.

use chrono::Utc;
use message_bus::{classify, ClassifyError, QueuedOp, TransferMessage, TxMessage};
use uuid::Uuid;

#[test]
fn test_published_transaction_classifies_back() {
    let message = TxMessage {
        account_id: Uuid::new_v4(),
        kind: "withdraw".to_string(),
        amount: 100,
        idempotency_key: "k2".to_string(),
        created_at: Utc::now(),
    };

    let payload = serde_json::to_vec(&message).unwrap();

    match classify(&payload).unwrap() {
        QueuedOp::Transaction(tx) => {
            assert_eq!(tx.account_id, message.account_id);
            assert_eq!(tx.kind, "withdraw");
            assert_eq!(tx.amount, 100);
            assert_eq!(tx.idempotency_key, "k2");
        }
        other => panic!("expected transaction, got {:?}", other),
    }
}

#[test]
fn test_published_transfer_classifies_back() {
    let message = TransferMessage {
        from_account_id: Uuid::new_v4(),
        to_account_id: Uuid::new_v4(),
        amount: 500,
        idempotency_key: "t1".to_string(),
        created_at: Utc::now(),
    };

    let payload = serde_json::to_vec(&message).unwrap();

    match classify(&payload).unwrap() {
        QueuedOp::Transfer(transfer) => {
            assert_eq!(transfer.from_account_id, message.from_account_id);
            assert_eq!(transfer.to_account_id, message.to_account_id);
            assert_eq!(transfer.amount, 500);
        }
        other => panic!("expected transfer, got {:?}", other),
    }
}

#[test]
fn test_raw_json_payloads_match_the_documented_shapes() {
    // Payloads as any non-Rust publisher would write them.
    let single = br#"{
        "account_id": "3fa09a6e-1d53-4f61-b8a4-1f2ad1a8a6a9",
        "type": "deposit",
        "amount": 200,
        "idempotency_key": "k1",
        "created_at": "2024-05-01T12:00:00Z"
    }"#;
    assert!(matches!(
        classify(single).unwrap(),
        QueuedOp::Transaction(_)
    ));

    let transfer = br#"{
        "from_account_id": "3fa09a6e-1d53-4f61-b8a4-1f2ad1a8a6a9",
        "to_account_id": "7c2b1a90-4c1f-4d8e-9f30-52b8f3a9e011",
        "amount": 500,
        "idempotency_key": "t1",
        "created_at": "2024-05-01T12:00:00Z"
    }"#;
    assert!(matches!(classify(transfer).unwrap(), QueuedOp::Transfer(_)));
}

#[test]
fn test_mixed_shape_payload_is_rejected_not_guessed() {
    let mixed = br#"{
        "account_id": "3fa09a6e-1d53-4f61-b8a4-1f2ad1a8a6a9",
        "from_account_id": "7c2b1a90-4c1f-4d8e-9f30-52b8f3a9e011",
        "to_account_id": "7c2b1a90-4c1f-4d8e-9f30-52b8f3a9e011",
        "type": "deposit",
        "amount": 500,
        "idempotency_key": "k1",
        "created_at": "2024-05-01T12:00:00Z"
    }"#;

    assert_eq!(classify(mixed).unwrap_err(), ClassifyError::Ambiguous);
}

#[test]
fn test_garbage_payload_is_rejected() {
    assert!(classify(b"not json").is_err());
    assert!(matches!(
        classify(br#"{"amount": 1}"#).unwrap_err(),
        ClassifyError::Unknown(_)
    ));
}
