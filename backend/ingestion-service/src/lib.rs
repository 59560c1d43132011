pub mod config;
pub mod error;
pub mod handlers;
pub mod kafka;

pub use config::Config;
pub use error::{AppError, KafkaError, Result};
pub use handlers::{AppState, ServiceInfo};
pub use kafka::{ConnectionManager, ConnectionState};
