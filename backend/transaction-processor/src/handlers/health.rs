/// Health handlers for the processor
use actix_web::{web, HttpResponse};
use serde::Serialize;

use super::AppState;
use crate::consumer::ConsumerHealth;

#[derive(Debug, Serialize)]
pub struct ConsumerReport {
    pub status: &'static str,
    pub message: String,
    pub kafka_connection: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kafka_error: Option<String>,
    pub consumer_status: &'static str,
    pub topic: String,
    pub bootstrap_servers: String,
    pub consumer_details: ConsumerHealth,
}

/// GET /health
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "transaction-processor"
    }))
}

/// Broker reachability and consumer state as seen by operators
///
/// A live worker cut off from the broker is reported unhealthy.
///
/// GET /health/kafka
pub async fn kafka_health(state: web::Data<AppState>) -> HttpResponse {
    let connection = state.broker.check_connection().await;
    let kafka_connection = if connection.is_ok() { "ok" } else { "failed" };

    let details = state
        .consumer
        .as_ref()
        .map(|consumer| consumer.health())
        .unwrap_or(ConsumerHealth::NOT_INITIALIZED);
    let consumer_status = details.status();

    let (status, message) = if connection.is_ok() && consumer_status == "running" {
        (
            "healthy",
            "Kafka connection and consumer are working properly".to_string(),
        )
    } else {
        (
            "unhealthy",
            format!("Kafka connection: {kafka_connection}, Consumer: {consumer_status}"),
        )
    };

    HttpResponse::Ok().json(ConsumerReport {
        status,
        message,
        kafka_connection,
        kafka_error: connection.err().map(|e| e.to_string()),
        consumer_status,
        topic: state.topic.clone(),
        bootstrap_servers: state.bootstrap_servers.clone(),
        consumer_details: details,
    })
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/health/kafka", web::get().to(kafka_health));
}
