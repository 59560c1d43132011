//! Transaction consumption loop
//!
//! One [`TransactionConsumer`] owns one subscription and one worker task. The
//! worker pulls records in partition order, hands each to the persistence
//! pool, and commits the record's offset only after the pool reports a
//! durable outcome (a new row or a recognized duplicate).
mod ledger;
mod source;

pub use ledger::OffsetLedger;
pub use source::{
    KafkaRecordSource, KafkaSourceConnector, KafkaSourceSettings, RecordPosition, RecordSource,
    SourceConnector, SourceError, SourceRecord,
};

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::ConsumerError;
use crate::persistence::PersistencePool;
use crate::processing::ProcessOutcome;

const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(1);
/// Withheld offsets on one partition before the stall is reported loudly
const STALLED_PARTITION_WARN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl ConsumerState {
    fn as_str(&self) -> &'static str {
        match self {
            ConsumerState::Stopped => "stopped",
            ConsumerState::Starting => "starting",
            ConsumerState::Running => "running",
            ConsumerState::Stopping => "stopping",
        }
    }
}

/// Operational view of a consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConsumerHealth {
    pub initialized: bool,
    pub running: bool,
    pub thread_alive: bool,
    pub consumer_created: bool,
}

impl ConsumerHealth {
    pub const NOT_INITIALIZED: ConsumerHealth = ConsumerHealth {
        initialized: false,
        running: false,
        thread_alive: false,
        consumer_created: false,
    };

    /// First failing condition wins
    pub fn status(&self) -> &'static str {
        if !self.initialized {
            "not_initialized"
        } else if !self.running {
            "stopped"
        } else if !self.thread_alive {
            "thread_dead"
        } else if !self.consumer_created {
            "consumer_not_created"
        } else {
            "running"
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub topic: String,
    pub shutdown_timeout: Duration,
}

struct ActiveRun {
    source: Arc<dyn RecordSource>,
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

pub struct TransactionConsumer {
    connector: Arc<dyn SourceConnector>,
    pool: Arc<PersistencePool>,
    settings: ConsumerSettings,
    state: Mutex<ConsumerState>,
    running: Arc<AtomicBool>,
    active: Mutex<Option<ActiveRun>>,
}

impl TransactionConsumer {
    pub fn new(
        connector: Arc<dyn SourceConnector>,
        pool: Arc<PersistencePool>,
        settings: ConsumerSettings,
    ) -> Self {
        Self {
            connector,
            pool,
            settings,
            state: Mutex::new(ConsumerState::Stopped),
            running: Arc::new(AtomicBool::new(false)),
            active: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConsumerState {
        *self.state.lock()
    }

    pub fn topic(&self) -> &str {
        &self.settings.topic
    }

    /// Open the subscription and spawn the worker. Must be called inside a Tokio runtime.
    pub fn start(&self) -> Result<(), ConsumerError> {
        {
            let mut state = self.state.lock();
            if *state != ConsumerState::Stopped {
                return Err(ConsumerError::InvalidState(state.as_str()));
            }
            *state = ConsumerState::Starting;
        }

        let source = match self.connector.connect() {
            Ok(source) => source,
            Err(e) => {
                error!(error = %e, topic = %self.settings.topic, "Failed to start Kafka consumer");
                *self.state.lock() = ConsumerState::Stopped;
                return Err(e.into());
            }
        };

        let (shutdown, shutdown_rx) = watch::channel(false);
        self.running.store(true, Ordering::SeqCst);

        let worker = ConsumeLoop {
            source: source.clone(),
            pool: self.pool.clone(),
            running: self.running.clone(),
            ledger: OffsetLedger::new(),
        };
        let task = tokio::spawn(worker.run(shutdown_rx));

        *self.active.lock() = Some(ActiveRun {
            source,
            task,
            shutdown,
        });
        *self.state.lock() = ConsumerState::Running;

        info!(topic = %self.settings.topic, "Kafka consumer started");
        Ok(())
    }

    /// Signal the worker, close the subscription and join with a bounded wait.
    ///
    /// An in-flight record is never interrupted; if it outlasts the wait the
    /// worker finishes it in the background and then exits.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock();
            if *state != ConsumerState::Running {
                return;
            }
            *state = ConsumerState::Stopping;
        }

        self.running.store(false, Ordering::SeqCst);
        let active = self.active.lock().take();

        if let Some(run) = active {
            let _ = run.shutdown.send(true);
            run.source.close();

            match tokio::time::timeout(self.settings.shutdown_timeout, run.task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Consumer worker ended abnormally"),
                Err(_) => warn!(
                    timeout_secs = self.settings.shutdown_timeout.as_secs(),
                    "Consumer worker did not stop in time, detaching"
                ),
            }
        }

        *self.state.lock() = ConsumerState::Stopped;
        info!("Kafka consumer stopped");
    }

    pub fn health(&self) -> ConsumerHealth {
        let active = self.active.lock();
        ConsumerHealth {
            initialized: true,
            running: self.running.load(Ordering::SeqCst),
            thread_alive: active
                .as_ref()
                .map(|run| !run.task.is_finished())
                .unwrap_or(false),
            consumer_created: active.is_some(),
        }
    }
}

struct ConsumeLoop {
    source: Arc<dyn RecordSource>,
    pool: Arc<PersistencePool>,
    running: Arc<AtomicBool>,
    ledger: OffsetLedger,
}

impl ConsumeLoop {
    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting consumer loop");

        loop {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            let next = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                next = self.source.next_record() => next,
            };

            match next {
                Some(Ok(record)) => self.process(record).await,
                Some(Err(e)) => {
                    error!(error = %e, "Kafka consumer error");
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(RECEIVE_ERROR_BACKOFF) => {}
                    }
                }
                None => {
                    info!("Subscription closed");
                    break;
                }
            }
        }

        info!("Consumer loop exited");
    }

    async fn process(&mut self, record: SourceRecord) {
        let position = record.position;

        let Some(payload) = record.payload else {
            warn!(%position, "Record without payload, offset withheld");
            self.withhold(&position);
            return;
        };

        match self.pool.submit(payload).await {
            Ok(outcome) => {
                if let ProcessOutcome::Persisted(stored) = &outcome {
                    info!(%position, transaction_id = %stored.id, "Successfully processed transaction");
                }
                self.commit(&position).await;
            }
            Err(e) => {
                error!(
                    %position,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Failed to process transaction, offset withheld"
                );
                self.withhold(&position);
            }
        }
    }

    fn withhold(&mut self, position: &RecordPosition) {
        let withheld = self.ledger.withhold(position);
        if withheld >= STALLED_PARTITION_WARN {
            error!(
                topic = %position.topic,
                partition = position.partition,
                withheld,
                lowest = ?self.ledger.lowest_withheld(&position.topic, position.partition),
                "Partition commits stalled behind withheld offsets"
            );
        }
    }

    async fn commit(&mut self, position: &RecordPosition) {
        if !self.ledger.clear_to_commit(position) {
            info!(
                %position,
                withheld = ?self.ledger.lowest_withheld(&position.topic, position.partition),
                "Commit deferred behind a withheld offset"
            );
            return;
        }

        match self.source.commit(position).await {
            Ok(()) => info!(%position, "Committed offset"),
            // The record is already durable; a redelivery is recognized as a duplicate
            Err(e) => warn!(%position, error = %e, "Failed to commit offset"),
        }
    }
}
