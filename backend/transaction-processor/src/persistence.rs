//! Persistence worker pool
//!
//! The consumption loop hands each record to a fixed set of async workers over
//! a bounded channel and waits for the reply with a deadline. A request that
//! times out keeps running on its worker; only the caller stops waiting.
use parking_lot::Mutex;
use resilience::{bounded, BoundedError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ProcessingError;
use crate::processing::{ProcessOutcome, RecordHandler};

struct PersistRequest {
    payload: Vec<u8>,
    reply: oneshot::Sender<Result<ProcessOutcome, ProcessingError>>,
}

pub struct PersistencePool {
    sender: Mutex<Option<flume::Sender<PersistRequest>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    timeout: Duration,
}

impl PersistencePool {
    /// Spawn `workers` tasks sharing `handler`. Must be called inside a Tokio runtime.
    pub fn spawn(handler: Arc<RecordHandler>, workers: usize, timeout: Duration) -> Self {
        let workers = workers.max(1);
        let (sender, receiver) = flume::bounded::<PersistRequest>(workers);

        let handles = (0..workers)
            .map(|worker_id| {
                let receiver = receiver.clone();
                let handler = handler.clone();
                tokio::spawn(async move {
                    debug!(worker_id, "Persistence worker started");
                    while let Ok(request) = receiver.recv_async().await {
                        let result = handler.handle(&request.payload).await;
                        // The caller may have given up waiting
                        let _ = request.reply.send(result);
                    }
                    debug!(worker_id, "Persistence worker stopped");
                })
            })
            .collect();

        info!(workers, timeout_secs = timeout.as_secs(), "Persistence pool started");

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(handles),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Process one payload on the pool, waiting at most the configured timeout
    pub async fn submit(&self, payload: Vec<u8>) -> Result<ProcessOutcome, ProcessingError> {
        let sender = self
            .sender
            .lock()
            .clone()
            .ok_or_else(|| ProcessingError::WorkerUnavailable("pool is closed".to_string()))?;

        let (reply, response) = oneshot::channel();
        let request = PersistRequest { payload, reply };

        let exchange = async move {
            sender
                .send_async(request)
                .await
                .map_err(|_| ProcessingError::WorkerUnavailable("all workers exited".to_string()))?;
            response
                .await
                .map_err(|_| ProcessingError::WorkerUnavailable("worker dropped the request".to_string()))?
        };

        match bounded(self.timeout, exchange).await {
            Ok(outcome) => Ok(outcome),
            Err(BoundedError::Elapsed(after)) => Err(ProcessingError::Timeout(after)),
            Err(BoundedError::Inner(e)) => Err(e),
        }
    }

    /// Stop accepting work and wait up to `grace` for workers to drain
    pub async fn close(&self, grace: Duration) {
        self.sender.lock().take();
        let handles: Vec<_> = self.workers.lock().drain(..).collect();

        for handle in handles {
            match tokio::time::timeout(grace, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Persistence worker panicked"),
                Err(_) => warn!("Persistence worker did not drain in time"),
            }
        }
        info!("Persistence pool closed");
    }
}
