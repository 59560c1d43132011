use async_trait::async_trait;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{ClientConfig, Offset, TopicPartitionList};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("failed to create consumer: {0}")]
    Create(String),

    #[error("failed to receive record: {0}")]
    Receive(String),

    #[error("failed to commit offset: {0}")]
    Commit(String),
}

/// Location of one record in the log
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordPosition {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

impl std::fmt::Display for RecordPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]@{}", self.topic, self.partition, self.offset)
    }
}

#[derive(Debug, Clone)]
pub struct SourceRecord {
    pub position: RecordPosition,
    pub key: Option<String>,
    pub payload: Option<Vec<u8>>,
}

/// An open subscription delivering records in partition order
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Next record; `None` once the subscription is closed
    async fn next_record(&self) -> Option<Result<SourceRecord, SourceError>>;

    /// Mark everything up to and including `position` as consumed
    async fn commit(&self, position: &RecordPosition) -> Result<(), SourceError>;

    /// Close the subscription. Idempotent.
    fn close(&self);
}

/// Opens subscriptions; called on every `start`
pub trait SourceConnector: Send + Sync {
    fn connect(&self) -> Result<Arc<dyn RecordSource>, SourceError>;
}

#[derive(Debug, Clone)]
pub struct KafkaSourceSettings {
    pub bootstrap_servers: String,
    pub topic: String,
    pub group_id: String,
    pub auto_offset_reset: String,
}

pub struct KafkaSourceConnector {
    settings: KafkaSourceSettings,
}

impl KafkaSourceConnector {
    pub fn new(settings: KafkaSourceSettings) -> Self {
        Self { settings }
    }
}

impl SourceConnector for KafkaSourceConnector {
    fn connect(&self) -> Result<Arc<dyn RecordSource>, SourceError> {
        let source = KafkaRecordSource::new(&self.settings)?;
        Ok(Arc::new(source))
    }
}

/// rdkafka `StreamConsumer` with manual commits
pub struct KafkaRecordSource {
    consumer: Arc<StreamConsumer>,
}

impl KafkaRecordSource {
    pub fn new(settings: &KafkaSourceSettings) -> Result<Self, SourceError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &settings.bootstrap_servers)
            .set("group.id", &settings.group_id)
            // Offsets advance only after the record is persisted
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &settings.auto_offset_reset)
            .set("session.timeout.ms", "45000")
            .set("max.poll.interval.ms", "300000")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| SourceError::Create(e.to_string()))?;

        consumer
            .subscribe(&[settings.topic.as_str()])
            .map_err(|e| SourceError::Create(e.to_string()))?;

        info!(
            topic = %settings.topic,
            group_id = %settings.group_id,
            "Kafka consumer subscribed"
        );

        Ok(Self {
            consumer: Arc::new(consumer),
        })
    }
}

#[async_trait]
impl RecordSource for KafkaRecordSource {
    async fn next_record(&self) -> Option<Result<SourceRecord, SourceError>> {
        let record = match self.consumer.recv().await {
            Ok(message) => Ok(SourceRecord {
                position: RecordPosition {
                    topic: message.topic().to_string(),
                    partition: message.partition(),
                    offset: message.offset(),
                },
                key: message
                    .key()
                    .map(|k| String::from_utf8_lossy(k).into_owned()),
                payload: message.payload().map(|p| p.to_vec()),
            }),
            Err(e) => Err(SourceError::Receive(e.to_string())),
        };
        Some(record)
    }

    async fn commit(&self, position: &RecordPosition) -> Result<(), SourceError> {
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(
                &position.topic,
                position.partition,
                Offset::Offset(position.offset + 1),
            )
            .map_err(|e| SourceError::Commit(e.to_string()))?;

        let consumer = self.consumer.clone();
        // Synchronous commit blocks the calling thread
        tokio::task::spawn_blocking(move || consumer.commit(&offsets, CommitMode::Sync))
            .await
            .map_err(|e| SourceError::Commit(e.to_string()))?
            .map_err(|e| SourceError::Commit(e.to_string()))?;

        debug!(%position, "Offset committed");
        Ok(())
    }

    fn close(&self) {
        self.consumer.unsubscribe();
        warn!("Kafka consumer unsubscribed");
    }
}
