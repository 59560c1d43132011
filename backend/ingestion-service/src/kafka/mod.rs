pub mod connection_manager;
pub mod producer;

pub use connection_manager::{
    ConnectionManager, ConnectionManagerConfig, ConnectionState, HealthStatus, KafkaHealth,
};
pub use producer::{
    DeliveryReceipt, EventPublisher, KafkaEventPublisher, KafkaProducerFactory,
    KafkaProducerSettings, ProducerError, ProducerFactory,
};
