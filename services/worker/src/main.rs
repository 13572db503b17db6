use balance_store::BalanceStore;
use dotenv::dotenv;
use ledger_store::LedgerStore;
use ledger_worker::{config::Config, consumer::Consumer};
use message_bus::{DlqRouter, NatsClient, NatsConfig, Subscriber, SubscriberConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let config = Config::from_env().expect("Failed to load configuration");
    config.validate().expect("Invalid configuration");

    info!(
        "Starting ledger worker ({} consumer tasks)",
        config.worker.consumers
    );

    let balances = Arc::new(
        BalanceStore::new(
            &config.balance_store.url,
            config.balance_store.max_connections,
        )
        .await
        .expect("Failed to connect to balance store"),
    );

    let ledger = Arc::new(
        LedgerStore::new(&config.ledger_store.url, config.ledger_store.max_connections)
            .await
            .expect("Failed to connect to ledger store"),
    );

    let nats = Arc::new(NatsClient::new(NatsConfig {
        url: config.nats.url.clone(),
        name: "ledger-worker".to_string(),
        ..Default::default()
    }));
    nats.connect().await.expect("Failed to connect to NATS");

    let dlq = Arc::new(DlqRouter::new(nats.clone()));

    let subscriber_config = SubscriberConfig {
        durable_name: config.nats.durable_name.clone(),
        ack_wait: Duration::from_secs(config.nats.ack_wait_secs),
        max_deliver: config.nats.max_deliver,
    };

    let shutdown = CancellationToken::new();
    let mut handles = Vec::with_capacity(config.worker.consumers);

    for task in 0..config.worker.consumers {
        let consumer = Consumer::new(
            balances.clone(),
            ledger.clone(),
            dlq.clone(),
            shutdown.clone(),
        );
        let subscriber = Subscriber::new(nats.clone(), subscriber_config.clone());

        handles.push(tokio::spawn(async move {
            if let Err(e) = consumer.run(&subscriber).await {
                error!("consumer task {} exited with error: {}", task, e);
            }
        }));
    }

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, draining consumers");
    shutdown.cancel();

    let drain = Duration::from_secs(config.worker.drain_timeout_secs);
    if tokio::time::timeout(drain, futures::future::join_all(handles))
        .await
        .is_err()
    {
        warn!("drain deadline exceeded, unacked deliveries will be redelivered");
    }

    nats.disconnect().await.ok();
    info!("worker stopped");
    Ok(())
}
