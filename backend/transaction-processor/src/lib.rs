pub mod broker;
pub mod config;
pub mod consumer;
pub mod db;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod models;
pub mod persistence;
pub mod processing;
pub mod store;
pub mod transform;

pub use broker::{BrokerClient, BrokerError, KafkaBrokerClient};
pub use config::Config;
pub use consumer::{ConsumerHealth, ConsumerState, TransactionConsumer};
pub use error::{ApiError, ConsumerError, ProcessingError};
pub use models::{CanonicalTransaction, TransactionStatus, TransactionType};
pub use persistence::PersistencePool;
pub use processing::{ProcessOutcome, RecordHandler};
