use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProducerError {
    #[error("failed to create producer: {0}")]
    Create(String),

    #[error("broker probe failed: {0}")]
    Probe(String),

    #[error("publish failed: {0}")]
    Publish(String),
}

/// Where a published message landed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReceipt {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// A live handle able to publish to the broker
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Cheap liveness check; must not block for longer than the probe timeout
    async fn probe(&self) -> Result<(), ProducerError>;

    /// Publish one keyed message and wait for the broker acknowledgment
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
    ) -> Result<DeliveryReceipt, ProducerError>;

    /// Flush pending messages and release the handle
    async fn close(&self);
}

/// Builds fresh publisher handles on demand
#[async_trait]
pub trait ProducerFactory: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn EventPublisher>, ProducerError>;

    /// Human readable broker address, for logs and health output
    fn endpoint(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct KafkaProducerSettings {
    pub bootstrap_servers: String,
    pub request_timeout: Duration,
    pub probe_timeout: Duration,
    pub message_timeout: Duration,
}

/// rdkafka-backed factory
pub struct KafkaProducerFactory {
    settings: KafkaProducerSettings,
}

impl KafkaProducerFactory {
    pub fn new(settings: KafkaProducerSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ProducerFactory for KafkaProducerFactory {
    async fn connect(&self) -> Result<Arc<dyn EventPublisher>, ProducerError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &self.settings.bootstrap_servers)
            .set(
                "request.timeout.ms",
                self.settings.request_timeout.as_millis().to_string(),
            )
            .set(
                "message.timeout.ms",
                self.settings.message_timeout.as_millis().to_string(),
            )
            .set("acks", "all")
            .set("retries", "1")
            .set("enable.idempotence", "true")
            .create()
            .map_err(|e| ProducerError::Create(e.to_string()))?;

        debug!(
            bootstrap_servers = %self.settings.bootstrap_servers,
            "Kafka producer handle created"
        );

        Ok(Arc::new(KafkaEventPublisher {
            producer,
            probe_timeout: self.settings.probe_timeout,
        }))
    }

    fn endpoint(&self) -> String {
        self.settings.bootstrap_servers.clone()
    }
}

/// Publisher over an rdkafka `FutureProducer`
pub struct KafkaEventPublisher {
    producer: FutureProducer,
    probe_timeout: Duration,
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    async fn probe(&self) -> Result<(), ProducerError> {
        let producer = self.producer.clone();
        let timeout = self.probe_timeout;

        // fetch_metadata blocks the calling thread
        let brokers = tokio::task::spawn_blocking(move || {
            producer
                .client()
                .fetch_metadata(None, timeout)
                .map(|metadata| metadata.brokers().len())
        })
        .await
        .map_err(|e| ProducerError::Probe(format!("probe task failed: {e}")))?
        .map_err(|e| ProducerError::Probe(e.to_string()))?;

        if brokers == 0 {
            return Err(ProducerError::Probe("no brokers available".to_string()));
        }
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
    ) -> Result<DeliveryReceipt, ProducerError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self.producer.send(record, Timeout::Never).await {
            Ok((partition, offset)) => Ok(DeliveryReceipt {
                topic: topic.to_string(),
                partition,
                offset,
            }),
            Err((err, _message)) => Err(ProducerError::Publish(err.to_string())),
        }
    }

    async fn close(&self) {
        let producer = self.producer.clone();
        let flushed = tokio::task::spawn_blocking(move || producer.flush(Duration::from_secs(5)))
            .await;

        match flushed {
            Ok(Ok(())) => info!("Kafka producer flushed and closed"),
            Ok(Err(e)) => warn!(error = %e, "Kafka producer flush failed during close"),
            Err(e) => warn!(error = %e, "Kafka producer close task failed"),
        }
    }
}
