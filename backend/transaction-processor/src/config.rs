//! Configuration for the transaction processor
use serde::Deserialize;
use std::time::Duration;

use crate::consumer::{ConsumerSettings, KafkaSourceSettings};

/// Main configuration struct, loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Apply the bundled migrations at startup
    #[serde(default)]
    pub run_migrations: bool,

    #[serde(default = "default_bootstrap_servers")]
    pub kafka_bootstrap_servers: String,

    #[serde(default = "default_topic")]
    pub kafka_transactions_topic: String,

    #[serde(default = "default_group_id")]
    pub kafka_group_id: String,

    #[serde(default = "default_auto_offset_reset")]
    pub kafka_auto_offset_reset: String,

    /// Start the consumer with the service; off leaves only the HTTP surface
    #[serde(default = "default_consumer_enabled")]
    pub kafka_consumer_enabled: bool,

    /// Bounded wait of an operator connectivity check or test send, in milliseconds
    #[serde(default = "default_kafka_check_timeout_ms")]
    pub kafka_check_timeout_ms: u64,

    /// Bounded wait on one record's persistence, in seconds
    #[serde(default = "default_processing_timeout")]
    pub processing_timeout_secs: u64,

    /// Bounded join when stopping the consumer, in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    #[serde(default = "default_persistence_workers")]
    pub persistence_workers: usize,

    #[serde(default = "default_port")]
    pub port: u16,

    /// `text` or `json` log output
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_secs() -> u64 {
    10
}

fn default_bootstrap_servers() -> String {
    "localhost:9092".to_string()
}

fn default_topic() -> String {
    transaction_events::topics::TRANSACTIONS.to_string()
}

fn default_group_id() -> String {
    transaction_events::TRANSACTION_PROCESSOR_GROUP.to_string()
}

fn default_auto_offset_reset() -> String {
    "earliest".to_string()
}

fn default_consumer_enabled() -> bool {
    true
}

fn default_kafka_check_timeout_ms() -> u64 {
    5000
}

fn default_processing_timeout() -> u64 {
    30
}

fn default_shutdown_timeout() -> u64 {
    5
}

fn default_persistence_workers() -> usize {
    4
}

fn default_port() -> u16 {
    8001
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn source_settings(&self) -> KafkaSourceSettings {
        KafkaSourceSettings {
            bootstrap_servers: self.kafka_bootstrap_servers.clone(),
            topic: self.kafka_transactions_topic.clone(),
            group_id: self.kafka_group_id.clone(),
            auto_offset_reset: self.kafka_auto_offset_reset.clone(),
        }
    }

    pub fn consumer_settings(&self) -> ConsumerSettings {
        ConsumerSettings {
            topic: self.kafka_transactions_topic.clone(),
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout_secs),
        }
    }

    pub fn kafka_check_timeout(&self) -> Duration {
        Duration::from_millis(self.kafka_check_timeout_ms)
    }

    pub fn processing_timeout(&self) -> Duration {
        Duration::from_secs(self.processing_timeout_secs)
    }
}
