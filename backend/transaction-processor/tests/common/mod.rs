#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use transaction_processor::broker::{BrokerClient, BrokerError, SentRecord};
use transaction_processor::consumer::{
    ConsumerSettings, RecordPosition, RecordSource, SourceConnector, SourceError, SourceRecord,
};
use transaction_processor::store::{MemoryStore, OperationLog};
use transaction_processor::{PersistencePool, RecordHandler, TransactionConsumer};

pub const TOPIC: &str = "transactions";

pub fn payload(user: u64, card: u64, amount: &str) -> Vec<u8> {
    format!(
        r#"{{"user": {user}, "card": {card}, "year": 2024, "month": 3, "day": 5, "time": "09:15", "amount": {amount}}}"#
    )
    .into_bytes()
}

pub fn record(partition: i32, offset: i64, payload: Vec<u8>) -> SourceRecord {
    SourceRecord {
        position: RecordPosition {
            topic: TOPIC.to_string(),
            partition,
            offset,
        },
        key: None,
        payload: Some(payload),
    }
}

/// In-memory subscription; commits are written to the shared operation log
pub struct FakeSource {
    records: tokio::sync::Mutex<mpsc::UnboundedReceiver<SourceRecord>>,
    feeder: mpsc::UnboundedSender<SourceRecord>,
    closed: watch::Sender<bool>,
    log: OperationLog,
    failing_commits: AtomicU32,
}

impl FakeSource {
    fn new(log: OperationLog) -> Self {
        let (feeder, records) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);
        Self {
            records: tokio::sync::Mutex::new(records),
            feeder,
            closed,
            log,
            failing_commits: AtomicU32::new(0),
        }
    }

    pub fn push(&self, record: SourceRecord) {
        let _ = self.feeder.send(record);
    }

    pub fn fail_next_commits(&self, n: u32) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

#[async_trait]
impl RecordSource for FakeSource {
    async fn next_record(&self) -> Option<Result<SourceRecord, SourceError>> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow() {
            return None;
        }
        let mut records = self.records.lock().await;
        tokio::select! {
            _ = closed.wait_for(|closed| *closed) => None,
            record = records.recv() => record.map(Ok),
        }
    }

    async fn commit(&self, position: &RecordPosition) -> Result<(), SourceError> {
        let failing = self
            .failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            self.log
                .lock()
                .push(format!("offset_failed:{}:{}", position.partition, position.offset));
            return Err(SourceError::Commit("coordinator unavailable".to_string()));
        }
        self.log
            .lock()
            .push(format!("offset:{}:{}", position.partition, position.offset));
        Ok(())
    }

    fn close(&self) {
        self.closed.send_replace(true);
    }
}

/// Hands out a fresh [`FakeSource`] on every connect
pub struct FakeConnector {
    log: OperationLog,
    down: AtomicBool,
    sources: Mutex<Vec<Arc<FakeSource>>>,
}

impl FakeConnector {
    pub fn new(log: OperationLog) -> Arc<Self> {
        Arc::new(Self {
            log,
            down: AtomicBool::new(false),
            sources: Mutex::new(Vec::new()),
        })
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.sources.lock().len()
    }

    /// Source opened by the most recent `start`
    pub fn current(&self) -> Arc<FakeSource> {
        self.sources
            .lock()
            .last()
            .cloned()
            .expect("consumer has not connected")
    }
}

impl SourceConnector for FakeConnector {
    fn connect(&self) -> Result<Arc<dyn RecordSource>, SourceError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(SourceError::Create("broker unreachable".to_string()));
        }
        let source = Arc::new(FakeSource::new(self.log.clone()));
        self.sources.lock().push(source.clone());
        Ok(source)
    }
}

/// Records what would have been published; offsets count up from zero
#[derive(Default)]
pub struct FakeBrokerClient {
    down: AtomicBool,
    sent: Mutex<Vec<(String, String, Vec<u8>)>>,
}

impl FakeBrokerClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// (topic, key, payload) per delivered record
    pub fn sent(&self) -> Vec<(String, String, Vec<u8>)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl BrokerClient for FakeBrokerClient {
    async fn check_connection(&self) -> Result<(), BrokerError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(BrokerError::Connect("broker unreachable".to_string()));
        }
        Ok(())
    }

    async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<SentRecord, BrokerError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(BrokerError::Send("broker unreachable".to_string()));
        }
        let mut sent = self.sent.lock();
        sent.push((topic.to_string(), key.to_string(), payload.to_vec()));
        Ok(SentRecord {
            topic: topic.to_string(),
            partition: 0,
            offset: sent.len() as i64 - 1,
        })
    }
}

pub struct Harness {
    pub store: MemoryStore,
    pub log: OperationLog,
    pub connector: Arc<FakeConnector>,
    pub pool: Arc<PersistencePool>,
    pub consumer: Arc<TransactionConsumer>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let log: OperationLog = Arc::new(Mutex::new(Vec::new()));
        let store = MemoryStore::with_log(log.clone());
        store.add_user("1");
        store.add_card("7", "1");
        store.add_user("2");
        store.add_card("8", "2");

        let connector = FakeConnector::new(log.clone());
        let handler = Arc::new(RecordHandler::new(Arc::new(store.clone())));
        let pool = Arc::new(PersistencePool::spawn(handler, 2, timeout));
        let consumer = Arc::new(TransactionConsumer::new(
            connector.clone(),
            pool.clone(),
            ConsumerSettings {
                topic: TOPIC.to_string(),
                shutdown_timeout: Duration::from_secs(5),
            },
        ));

        Self {
            store,
            log,
            connector,
            pool,
            consumer,
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn position_of(&self, entry: &str) -> Option<usize> {
        self.log.lock().iter().position(|e| e == entry)
    }

    /// Poll until `entry` shows up in the operation log
    pub async fn wait_for_entry(&self, entry: &str) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while self.position_of(entry).is_none() {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {entry}, log: {:?}",
                self.entries()
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Poll until the log holds at least `count` entries equal to `entry`
    pub async fn wait_for_count(&self, entry: &str, count: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let seen = self.log.lock().iter().filter(|e| *e == entry).count();
            if seen >= count {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {count}x {entry}, log: {:?}",
                self.entries()
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
