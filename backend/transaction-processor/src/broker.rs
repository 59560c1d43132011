//! Operator access to the broker: connectivity checks and test records
//!
//! Every call opens its own short-lived producer, so neither path touches the
//! consumer's subscription.
use async_trait::async_trait;
use chrono::NaiveDateTime;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use transaction_events::RawEvent;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrokerError {
    #[error("Kafka connection failed: {0}")]
    Connect(String),

    #[error("Kafka send failed: {0}")]
    Send(String),
}

/// Where a published record landed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Bounded metadata round-trip through a throwaway client
    async fn check_connection(&self) -> Result<(), BrokerError>;

    /// Publish one record and wait for the acknowledgment
    async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<SentRecord, BrokerError>;
}

pub struct KafkaBrokerClient {
    bootstrap_servers: String,
    timeout: Duration,
}

impl KafkaBrokerClient {
    pub fn new(bootstrap_servers: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
            timeout,
        }
    }

    fn producer(&self) -> Result<FutureProducer, BrokerError> {
        ClientConfig::new()
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("message.timeout.ms", self.timeout.as_millis().to_string())
            .set("socket.timeout.ms", self.timeout.as_millis().to_string())
            .create()
            .map_err(|e| BrokerError::Connect(e.to_string()))
    }
}

#[async_trait]
impl BrokerClient for KafkaBrokerClient {
    async fn check_connection(&self) -> Result<(), BrokerError> {
        let producer = self.producer()?;
        let timeout = self.timeout;

        // fetch_metadata blocks the calling thread
        let brokers = tokio::task::spawn_blocking(move || {
            producer
                .client()
                .fetch_metadata(None, timeout)
                .map(|metadata| metadata.brokers().len())
        })
        .await
        .map_err(|e| BrokerError::Connect(format!("metadata task failed: {e}")))?
        .map_err(|e| BrokerError::Connect(e.to_string()))?;

        if brokers == 0 {
            return Err(BrokerError::Connect("no brokers available".to_string()));
        }
        debug!(brokers, "Kafka connection check passed");
        Ok(())
    }

    async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<SentRecord, BrokerError> {
        let producer = self.producer()?;
        let record = FutureRecord::to(topic).key(key).payload(payload);

        let (partition, offset) = producer
            .send(record, Timeout::After(self.timeout))
            .await
            .map_err(|(e, _)| BrokerError::Send(e.to_string()))?;

        info!(topic, partition, offset, key, "Test record delivered");
        Ok(SentRecord {
            topic: topic.to_string(),
            partition,
            offset,
        })
    }
}

/// Synthetic grocery purchase for exercising the pipeline end to end
pub fn test_transaction(user: i64, card: i64, at: NaiveDateTime) -> RawEvent {
    use chrono::{Datelike, Timelike};

    RawEvent {
        user,
        card,
        year: Some(i64::from(at.year())),
        month: Some(i64::from(at.month())),
        day: Some(i64::from(at.day())),
        time: Some(format!(
            "{:02}:{:02}:{:02}",
            at.hour(),
            at.minute(),
            at.second()
        )),
        amount: Decimal::new(15000, 2),
        use_chip: Some("Chip Transaction".to_string()),
        merchant_id: Some(12345),
        merchant_city: Some("Test City".to_string()),
        merchant_state: Some("CA".to_string()),
        zip: Some("12345".to_string()),
        mcc: Some(5411),
        errors: None,
        is_fraud: false,
    }
}
