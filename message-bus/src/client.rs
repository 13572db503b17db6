//! NATS client wrapper with connection management

use crate::{Error, Result};
use async_nats::jetstream::{self, stream::Config as StreamConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

/// NATS client configuration
#[derive(Debug, Clone)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,

    /// Connection name
    pub name: String,

    /// Connection timeout
    pub connection_timeout: Duration,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            name: "ledger".to_string(),
            connection_timeout: Duration::from_secs(5),
        }
    }
}

/// NATS client wrapper
pub struct NatsClient {
    config: NatsConfig,
    client: Arc<RwLock<Option<async_nats::Client>>>,
    jetstream: Arc<RwLock<Option<jetstream::Context>>>,
}

impl NatsClient {
    /// Create new NATS client
    pub fn new(config: NatsConfig) -> Self {
        Self {
            config,
            client: Arc::new(RwLock::new(None)),
            jetstream: Arc::new(RwLock::new(None)),
        }
    }

    /// Connect to the NATS server and initialize JetStream
    pub async fn connect(&self) -> Result<()> {
        info!("Connecting to NATS server: {}", self.config.url);

        let options = async_nats::ConnectOptions::new()
            .name(&self.config.name)
            .connection_timeout(self.config.connection_timeout)
            .retry_on_initial_connect();

        let client = async_nats::connect_with_options(self.config.url.clone(), options)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        info!("Connected to NATS");

        *self.client.write().await = Some(client.clone());
        *self.jetstream.write().await = Some(jetstream::new(client));

        Ok(())
    }

    /// Get underlying NATS client
    pub async fn client(&self) -> Result<async_nats::Client> {
        self.client
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::Connection("Not connected".to_string()))
    }

    /// Get JetStream context
    pub async fn jetstream(&self) -> Result<jetstream::Context> {
        self.jetstream
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::Connection("JetStream not initialized".to_string()))
    }

    /// Check if connected
    pub async fn is_connected(&self) -> bool {
        self.client.read().await.is_some()
    }

    /// Flush pending messages and drop the connection
    pub async fn disconnect(&self) -> Result<()> {
        if let Some(client) = self.client.write().await.take() {
            client
                .flush()
                .await
                .map_err(|e| Error::Connection(e.to_string()))?;

            info!("Disconnected from NATS");
        }

        *self.jetstream.write().await = None;
        Ok(())
    }

    /// Create or get a durable file-backed JetStream stream
    pub async fn get_or_create_stream(
        &self,
        stream_name: &str,
        subjects: Vec<String>,
    ) -> Result<jetstream::stream::Stream> {
        let js = self.jetstream().await?;

        match js.get_stream(stream_name).await {
            Ok(stream) => Ok(stream),
            Err(_) => {
                info!("Creating JetStream stream: {}", stream_name);

                let config = StreamConfig {
                    name: stream_name.to_string(),
                    subjects,
                    max_messages: 1_000_000,
                    max_bytes: 1_073_741_824, // 1 GB
                    max_age: Duration::from_secs(7 * 24 * 60 * 60),
                    retention: jetstream::stream::RetentionPolicy::Limits,
                    storage: jetstream::stream::StorageType::File,
                    num_replicas: 1,
                    ..Default::default()
                };

                js.create_stream(config)
                    .await
                    .map_err(|e| Error::Stream(e.to_string()))
            }
        }
    }
}
