//! Configuration for the ingestion service
use resilience::RetryConfig;
use serde::Deserialize;
use std::time::Duration;

use crate::kafka::{ConnectionManagerConfig, KafkaProducerSettings};

/// Main configuration struct, loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Kafka broker host
    #[serde(default = "default_kafka_host")]
    pub kafka_host: String,

    /// Kafka broker port
    #[serde(default = "default_kafka_port")]
    pub kafka_port: u16,

    /// Request timeout for each connection attempt, in seconds
    #[serde(default = "default_connection_timeout")]
    pub kafka_connection_timeout: u64,

    /// Connection attempts before the broker is declared unavailable
    #[serde(default = "default_retry_attempts")]
    pub kafka_retry_attempts: u32,

    /// Fixed delay between connection attempts, in seconds
    #[serde(default = "default_retry_delay")]
    pub kafka_retry_delay: u64,

    /// Wait enforced after an exhausted retry budget, in seconds
    #[serde(default = "default_connection_cooldown")]
    pub kafka_connection_cooldown: u64,

    /// Bounded blocking window of a liveness probe, in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub kafka_probe_timeout_ms: u64,

    /// How long to wait for a broker acknowledgment, in seconds
    #[serde(default = "default_send_timeout")]
    pub kafka_send_timeout: u64,

    /// Topic receiving raw transactions
    #[serde(default = "default_topic")]
    pub kafka_transactions_topic: String,

    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// `text` or `json` log output
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_kafka_host() -> String {
    "localhost".to_string()
}

fn default_kafka_port() -> u16 {
    9092
}

fn default_connection_timeout() -> u64 {
    10
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    2
}

fn default_connection_cooldown() -> u64 {
    30
}

fn default_probe_timeout_ms() -> u64 {
    5000
}

fn default_send_timeout() -> u64 {
    10
}

fn default_topic() -> String {
    transaction_events::topics::TRANSACTIONS.to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kafka_host: default_kafka_host(),
            kafka_port: default_kafka_port(),
            kafka_connection_timeout: default_connection_timeout(),
            kafka_retry_attempts: default_retry_attempts(),
            kafka_retry_delay: default_retry_delay(),
            kafka_connection_cooldown: default_connection_cooldown(),
            kafka_probe_timeout_ms: default_probe_timeout_ms(),
            kafka_send_timeout: default_send_timeout(),
            kafka_transactions_topic: default_topic(),
            port: default_port(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn bootstrap_servers(&self) -> String {
        format!("{}:{}", self.kafka_host, self.kafka_port)
    }

    pub fn producer_settings(&self) -> KafkaProducerSettings {
        KafkaProducerSettings {
            bootstrap_servers: self.bootstrap_servers(),
            request_timeout: Duration::from_secs(self.kafka_connection_timeout),
            probe_timeout: Duration::from_millis(self.kafka_probe_timeout_ms),
            message_timeout: Duration::from_secs(self.kafka_send_timeout),
        }
    }

    pub fn manager_config(&self) -> ConnectionManagerConfig {
        ConnectionManagerConfig {
            retry: RetryConfig::new(
                self.kafka_retry_attempts,
                Duration::from_secs(self.kafka_retry_delay),
            ),
            cooldown: Duration::from_secs(self.kafka_connection_cooldown),
            send_timeout: Duration::from_secs(self.kafka_send_timeout),
        }
    }
}
