//! Dead-letter routing
//!
//! Deliveries rejected as permanent are wrapped in a [`DlqEntry`] envelope
//! and published to the dead-letter stream before the original delivery is
//! terminated. Nothing re-drives the dead-letter stream automatically; an
//! operator inspects it out of band.

use crate::{client::NatsClient, metrics::DLQ_TOTAL, Error, Result, DLQ_STREAM, DLQ_SUBJECT_PREFIX};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Envelope recorded for every permanently rejected delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    /// Entry id, also the final subject segment
    pub id: Uuid,

    /// Why the delivery was rejected
    pub reason: String,

    /// Transport-reported delivery attempts at rejection time
    pub deliveries: i64,

    /// The original payload, verbatim where it parsed as JSON
    pub payload: serde_json::Value,

    /// When the rejection was recorded
    pub failed_at: DateTime<Utc>,
}

/// Routes rejected deliveries to the dead-letter stream
pub struct DlqRouter {
    client: Arc<NatsClient>,
}

impl DlqRouter {
    /// Create new DLQ router
    pub fn new(client: Arc<NatsClient>) -> Self {
        Self { client }
    }

    /// Record a rejected delivery on the dead-letter stream.
    ///
    /// Returns the entry id once the JetStream ack confirms the entry is
    /// durable; the caller must not terminate the original delivery before
    /// that.
    pub async fn route(&self, payload: &[u8], reason: &str, deliveries: i64) -> Result<Uuid> {
        let entry = DlqEntry {
            id: Uuid::new_v4(),
            reason: reason.to_string(),
            deliveries,
            payload: serde_json::from_slice(payload)
                .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(payload).into_owned())),
            failed_at: Utc::now(),
        };

        self.client
            .get_or_create_stream(DLQ_STREAM, vec![format!("{}.>", DLQ_SUBJECT_PREFIX)])
            .await?;

        let js = self.client.jetstream().await?;
        let subject = format!("{}.{}", DLQ_SUBJECT_PREFIX, entry.id);
        let body = serde_json::to_vec(&entry)?;

        js.publish(subject, body.into())
            .await
            .map_err(|e| Error::Publish(e.to_string()))?
            .await
            .map_err(|e| Error::Publish(e.to_string()))?;

        DLQ_TOTAL.inc();
        warn!(
            "Delivery moved to DLQ: {} (reason: {}, deliveries: {})",
            entry.id, entry.reason, deliveries
        );

        Ok(entry.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dlq_entry_serialization_roundtrip() {
        let entry = DlqEntry {
            id: Uuid::new_v4(),
            reason: "insufficient_funds: balance 100, requested 10000".to_string(),
            deliveries: 1,
            payload: serde_json::json!({"account_id": "x", "amount": 10000}),
            failed_at: Utc::now(),
        };

        let bytes = serde_json::to_vec(&entry).unwrap();
        let decoded: DlqEntry = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(decoded.id, entry.id);
        assert_eq!(decoded.reason, entry.reason);
        assert_eq!(decoded.payload, entry.payload);
    }

    #[test]
    fn test_dlq_entry_preserves_unparseable_payload() {
        let raw = b"not json at all";
        let value: serde_json::Value = serde_json::from_slice(raw)
            .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(raw).into_owned()));
        assert_eq!(value, serde_json::Value::String("not json at all".to_string()));
    }
}
