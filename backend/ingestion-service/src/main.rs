use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use ingestion_service::{
    handlers::{register_routes, AppState, ServiceInfo},
    kafka::{ConnectionManager, KafkaProducerFactory},
    Config,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("Failed to load configuration")?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,actix_web=info,rdkafka=warn".into());
    if config.log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        kafka = %config.bootstrap_servers(),
        topic = %config.kafka_transactions_topic,
        "Starting ingestion service"
    );

    let factory = Arc::new(KafkaProducerFactory::new(config.producer_settings()));
    let manager = Arc::new(ConnectionManager::new(factory, config.manager_config()));

    // Connection is established lazily; a broker outage at boot is not fatal.
    let state = web::Data::new(AppState {
        manager: manager.clone(),
        topic: config.kafka_transactions_topic.clone(),
        info: ServiceInfo {
            kafka_host: config.kafka_host.clone(),
            kafka_port: config.kafka_port,
            topic: config.kafka_transactions_topic.clone(),
            connection_timeout: config.kafka_connection_timeout,
            retry_attempts: config.kafka_retry_attempts,
            retry_delay: config.kafka_retry_delay,
        },
    });

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting HTTP server on {}", addr);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::default())
            .configure(register_routes)
    })
    .bind(&addr)
    .with_context(|| format!("Failed to bind {addr}"))?
    .run()
    .await
    .context("HTTP server error")?;

    tracing::info!("HTTP server stopped, closing Kafka producer");
    manager.close().await;

    Ok(())
}
