pub mod health;
pub mod transactions;

use actix_web::web;
use std::sync::Arc;

use crate::error::AppError;
use crate::kafka::ConnectionManager;
pub use health::ServiceInfo;

/// Shared state handed to every handler
pub struct AppState {
    pub manager: Arc<ConnectionManager>,
    pub topic: String,
    pub info: ServiceInfo,
}

/// JSON extractor config that reports decode failures in the service's error shape
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| AppError::Validation(err.to_string()).into())
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config());
    transactions::register_routes(cfg);
    health::register_routes(cfg);
}
