pub mod health;
pub mod test_transaction;

use actix_web::web;
use std::sync::Arc;

use crate::broker::BrokerClient;
use crate::consumer::TransactionConsumer;

/// Shared state handed to every handler
pub struct AppState {
    /// `None` when the consumer is disabled for this instance
    pub consumer: Option<Arc<TransactionConsumer>>,
    pub broker: Arc<dyn BrokerClient>,
    pub topic: String,
    pub bootstrap_servers: String,
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    health::register_routes(cfg);
    test_transaction::register_routes(cfg);
}
