//! Durable pull consumer over the transaction stream

use crate::{client::NatsClient, Error, Result, TX_STREAM, TX_SUBJECT};
use async_nats::jetstream::consumer;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Subscriber configuration
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Durable consumer name; workers sharing it load-balance deliveries
    pub durable_name: String,

    /// How long the server waits for an ack before redelivering
    pub ack_wait: Duration,

    /// Max delivery attempts per message
    pub max_deliver: i64,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            durable_name: "ledger-worker".to_string(),
            ack_wait: Duration::from_secs(30),
            max_deliver: 5,
        }
    }
}

/// Subscriber binding a durable consumer to the transaction stream
pub struct Subscriber {
    client: Arc<NatsClient>,
    config: SubscriberConfig,
}

impl Subscriber {
    /// Create new subscriber
    pub fn new(client: Arc<NatsClient>, config: SubscriberConfig) -> Self {
        Self { client, config }
    }

    /// Open the delivery stream.
    ///
    /// Ensures the transaction stream and the durable consumer exist, then
    /// returns the message stream. Acknowledgement is explicit: the caller
    /// settles every delivery with ack, nak or term.
    pub async fn messages(&self) -> Result<consumer::pull::Stream> {
        let stream = self
            .client
            .get_or_create_stream(TX_STREAM, vec![TX_SUBJECT.to_string()])
            .await?;

        let consumer_config = consumer::pull::Config {
            durable_name: Some(self.config.durable_name.clone()),
            filter_subject: TX_SUBJECT.to_string(),
            ack_policy: consumer::AckPolicy::Explicit,
            ack_wait: self.config.ack_wait,
            max_deliver: self.config.max_deliver,
            deliver_policy: consumer::DeliverPolicy::All,
            ..Default::default()
        };

        let consumer = stream
            .create_consumer(consumer_config)
            .await
            .map_err(|e| Error::Subscribe(e.to_string()))?;

        info!(
            "Durable consumer ready: stream={}, consumer={}",
            TX_STREAM, self.config.durable_name
        );

        consumer
            .messages()
            .await
            .map_err(|e| Error::Subscribe(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::NatsConfig;

    #[tokio::test]
    async fn test_subscriber_config_default() {
        let config = SubscriberConfig::default();
        assert_eq!(config.durable_name, "ledger-worker");
        assert_eq!(config.max_deliver, 5);
        assert_eq!(config.ack_wait, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_messages_fails_when_disconnected() {
        let client = Arc::new(NatsClient::new(NatsConfig::default()));
        let subscriber = Subscriber::new(client, SubscriberConfig::default());
        assert!(subscriber.messages().await.is_err());
    }
}
