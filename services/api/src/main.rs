use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use balance_store::BalanceStore;
use dotenv::dotenv;
use ledger_api::{
    config::Config,
    handlers::{self, AppState},
};
use ledger_store::LedgerStore;
use message_bus::{NatsClient, NatsConfig, Publisher, PublisherConfig};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let config = Config::from_env().expect("Failed to load configuration");
    config.validate().expect("Invalid configuration");

    info!("Starting ledger API on port {}", config.server.port);

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
        name: "ledger-api".to_string(),
        ..Default::default()
    }));
    nats.connect().await.expect("Failed to connect to NATS");

    let publisher = Arc::new(Publisher::new(nats, PublisherConfig::default()));

    let state = web::Data::new(AppState {
        balances,
        ledger,
        publisher,
    });

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .app_data(state.clone())
            .configure(handlers::configure_routes)
    })
    .workers(config.server.workers)
    .bind((config.server.host.clone(), config.server.port))?
    .shutdown_timeout(10)
    .run()
    .await
}
