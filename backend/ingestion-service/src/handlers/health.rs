/// Liveness and dependency health handlers
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Serialize;

use super::AppState;
use crate::kafka::KafkaHealth;

#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub kafka_host: String,
    pub kafka_port: u16,
    pub topic: String,
    pub connection_timeout: u64,
    pub retry_attempts: u32,
    pub retry_delay: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub service: &'static str,
    pub timestamp: String,
    pub kafka: KafkaHealth,
    pub environment: ServiceInfo,
}

/// Plain liveness probe; never touches the broker
///
/// GET /healthz
pub async fn healthz() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Full health report including the broker.
///
/// A broker outage degrades the report but the endpoint itself still answers 200.
///
/// GET /health
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let kafka = state.manager.health_check().await;

    HttpResponse::Ok().json(HealthReport {
        status: if kafka.is_healthy() { "healthy" } else { "degraded" },
        service: "ingestion-service",
        timestamp: Utc::now().to_rfc3339(),
        kafka,
        environment: state.info.clone(),
    })
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/healthz", web::get().to(healthz))
        .route("/health", web::get().to(health));
}
