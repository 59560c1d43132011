use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transaction_processor::{
    consumer::KafkaSourceConnector,
    db,
    handlers::{register_routes, AppState},
    store::PgTransactionStore,
    Config, KafkaBrokerClient, PersistencePool, RecordHandler, TransactionConsumer,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("Failed to load configuration")?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,transaction_processor=debug,rdkafka=warn,sqlx=warn".into());
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
        kafka = %config.kafka_bootstrap_servers,
        topic = %config.kafka_transactions_topic,
        group_id = %config.kafka_group_id,
        "Starting transaction processor"
    );

    let pool = db::init_pool(&config)
        .await
        .context("Failed to connect to database")?;

    if config.run_migrations {
        db::MIGRATOR
            .run(&pool)
            .await
            .context("Failed to run migrations")?;
        tracing::info!("Database migrations applied");
    }

    let store = Arc::new(PgTransactionStore::new(pool));
    let handler = Arc::new(RecordHandler::new(store));
    let persistence = Arc::new(PersistencePool::spawn(
        handler,
        config.persistence_workers,
        config.processing_timeout(),
    ));

    let consumer = if config.kafka_consumer_enabled {
        let consumer = Arc::new(TransactionConsumer::new(
            Arc::new(KafkaSourceConnector::new(config.source_settings())),
            persistence.clone(),
            config.consumer_settings(),
        ));
        // A broker outage at boot leaves the HTTP surface up and reports `stopped`
        if let Err(e) = consumer.start() {
            tracing::error!(error = %e, "Kafka consumer not started");
        }
        Some(consumer)
    } else {
        tracing::warn!("Kafka consumer disabled by configuration");
        None
    };

    let state = web::Data::new(AppState {
        consumer: consumer.clone(),
        broker: Arc::new(KafkaBrokerClient::new(
            config.kafka_bootstrap_servers.clone(),
            config.kafka_check_timeout(),
        )),
        topic: config.kafka_transactions_topic.clone(),
        bootstrap_servers: config.kafka_bootstrap_servers.clone(),
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

    tracing::info!("HTTP server stopped, shutting down consumer");
    if let Some(consumer) = consumer {
        consumer.stop().await;
    }
    persistence
        .close(Duration::from_secs(config.shutdown_timeout_secs))
        .await;

    Ok(())
}
