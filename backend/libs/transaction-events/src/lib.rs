/// Wire contract for point-of-sale transaction events
///
/// The ingestion service publishes [`RawEvent`] records as UTF-8 JSON onto the
/// transactions topic; the transaction processor consumes the same shape.
/// Both sides share the schedule validation in [`schedule`] so that a record
/// accepted by the producer is judged by the same rules on the consumer.
pub mod incoming;
pub mod raw_event;
pub mod schedule;

pub use incoming::{IncomingTransaction, NormalizeError};
pub use raw_event::RawEvent;
pub use schedule::ScheduleError;

/// Kafka topics carrying transaction events
pub mod topics {
    /// Raw point-of-sale transactions, one JSON-encoded `RawEvent` per record
    pub const TRANSACTIONS: &str = "transactions";
}

/// Fixed consumer group so that every processor instance shares partitions
pub const TRANSACTION_PROCESSOR_GROUP: &str = "transaction-processor";
