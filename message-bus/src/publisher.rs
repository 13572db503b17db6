//! Message publisher with retry logic

use crate::{
    client::NatsClient,
    message::{TransferMessage, TxMessage},
    metrics::{MESSAGE_PUBLISH_DURATION, MESSAGE_PUBLISH_TOTAL},
    Error, Result, TX_STREAM, TX_SUBJECT,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, warn};

/// Publisher configuration
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Publish timeout, per attempt
    pub publish_timeout: Duration,

    /// Max retry attempts
    pub max_retry_attempts: u32,

    /// Initial retry delay
    pub initial_retry_delay: Duration,

    /// Max retry delay
    pub max_retry_delay: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            publish_timeout: Duration::from_secs(5),
            max_retry_attempts: 3,
            initial_retry_delay: Duration::from_millis(100),
            max_retry_delay: Duration::from_secs(2),
        }
    }
}

/// Message publisher for the transaction stream
pub struct Publisher {
    client: Arc<NatsClient>,
    config: PublisherConfig,
}

impl Publisher {
    /// Create new publisher
    pub fn new(client: Arc<NatsClient>, config: PublisherConfig) -> Self {
        Self { client, config }
    }

    /// Publish a single-account transaction message
    pub async fn publish_transaction(&self, message: &TxMessage) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        self.publish("transaction", &payload).await
    }

    /// Publish a transfer message
    pub async fn publish_transfer(&self, message: &TransferMessage) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        self.publish("transfer", &payload).await
    }

    async fn publish(&self, shape: &str, payload: &[u8]) -> Result<()> {
        let start = Instant::now();

        let result = self.publish_with_retry(payload).await;

        let duration = start.elapsed().as_secs_f64();
        MESSAGE_PUBLISH_DURATION
            .with_label_values(&[shape])
            .observe(duration);

        let status = if result.is_ok() { "success" } else { "error" };
        MESSAGE_PUBLISH_TOTAL
            .with_label_values(&[shape, status])
            .inc();

        result
    }

    /// Publish with exponential backoff retry
    async fn publish_with_retry(&self, payload: &[u8]) -> Result<()> {
        let mut attempts = 0;
        let mut delay = self.config.initial_retry_delay;

        loop {
            attempts += 1;

            match self.publish_once(payload).await {
                Ok(_) => return Ok(()),
                Err(e) => {
                    if attempts >= self.config.max_retry_attempts {
                        error!("Failed to publish after {} attempts: {}", attempts, e);
                        return Err(e);
                    }

                    warn!(
                        "Publish failed (attempt {}), retrying in {:?}: {}",
                        attempts, delay, e
                    );
                    tokio::time::sleep(delay).await;

                    delay = (delay * 2).min(self.config.max_retry_delay);
                }
            }
        }
    }

    /// Single publish attempt; durable once the JetStream ack arrives
    async fn publish_once(&self, payload: &[u8]) -> Result<()> {
        let js = self.client.jetstream().await?;

        self.client
            .get_or_create_stream(TX_STREAM, vec![TX_SUBJECT.to_string()])
            .await?;

        let publish = async {
            let ack = js
                .publish(TX_SUBJECT, bytes::Bytes::copy_from_slice(payload))
                .await
                .map_err(|e| Error::Publish(e.to_string()))?;

            ack.await
                .map_err(|e| Error::Publish(format!("Publish ack failed: {}", e)))
        };

        tokio::time::timeout(self.config.publish_timeout, publish)
            .await
            .map_err(|_| Error::Publish("Publish timed out".to_string()))??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::NatsConfig;

    #[tokio::test]
    async fn test_publisher_config_default() {
        let config = PublisherConfig::default();
        assert_eq!(config.max_retry_attempts, 3);
        assert_eq!(config.initial_retry_delay, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_publish_fails_when_disconnected() {
        let client = Arc::new(NatsClient::new(NatsConfig::default()));
        let publisher = Publisher::new(client, PublisherConfig::default());

        let message = TxMessage {
            account_id: uuid::Uuid::new_v4(),
            kind: "deposit".to_string(),
            amount: 100,
            idempotency_key: "k".to_string(),
            created_at: chrono::Utc::now(),
        };

        assert!(publisher.publish_transaction(&message).await.is_err());
    }
}
