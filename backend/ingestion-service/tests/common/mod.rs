//! In-process broker double shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use ingestion_service::kafka::{DeliveryReceipt, EventPublisher, ProducerError, ProducerFactory};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Published {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
}

#[derive(Default)]
pub struct FakeBroker {
    down: AtomicBool,
    publish_fails: AtomicBool,
    failing_probes: AtomicU32,
    publish_delay: Mutex<Option<Duration>>,
    liveness_delay: Mutex<Option<Duration>>,
    pub liveness_checks: AtomicU32,
    pub connects: AtomicU32,
    pub closes: AtomicU32,
    pub published: Mutex<Vec<Published>>,
}

impl FakeBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn set_publish_fails(&self, fails: bool) {
        self.publish_fails.store(fails, Ordering::SeqCst);
    }

    /// Make the next `n` probes fail even while the broker is up
    pub fn fail_next_probes(&self, n: u32) {
        self.failing_probes.store(n, Ordering::SeqCst);
    }

    pub fn set_publish_delay(&self, delay: Duration) {
        *self.publish_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_liveness_delay(&self, delay: Duration) {
        *self.liveness_delay.lock().unwrap() = Some(delay);
    }

    pub fn liveness_checks(&self) -> u32 {
        self.liveness_checks.load(Ordering::SeqCst)
    }

    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn published(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }
}

pub struct FakeFactory {
    pub broker: Arc<FakeBroker>,
}

#[async_trait]
impl ProducerFactory for FakeFactory {
    async fn connect(&self) -> Result<Arc<dyn EventPublisher>, ProducerError> {
        self.broker.connects.fetch_add(1, Ordering::SeqCst);
        if self.broker.down.load(Ordering::SeqCst) {
            return Err(ProducerError::Create("connection refused".to_string()));
        }
        Ok(Arc::new(FakePublisher {
            broker: self.broker.clone(),
        }))
    }

    fn endpoint(&self) -> String {
        "fake-broker:9092".to_string()
    }
}

pub struct FakePublisher {
    broker: Arc<FakeBroker>,
}

#[async_trait]
impl EventPublisher for FakePublisher {
    async fn probe(&self) -> Result<(), ProducerError> {
        self.broker.liveness_checks.fetch_add(1, Ordering::SeqCst);
        let delay = *self.broker.liveness_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.broker.down.load(Ordering::SeqCst) {
            return Err(ProducerError::Probe("broker down".to_string()));
        }
        let forced = self
            .broker
            .failing_probes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if forced.is_ok() {
            return Err(ProducerError::Probe("metadata request failed".to_string()));
        }
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
    ) -> Result<DeliveryReceipt, ProducerError> {
        let delay = *self.broker.publish_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.broker.publish_fails.load(Ordering::SeqCst) {
            return Err(ProducerError::Publish("broker rejected message".to_string()));
        }

        let mut published = self.broker.published.lock().unwrap();
        published.push(Published {
            topic: topic.to_string(),
            key: key.to_string(),
            payload: payload.to_vec(),
        });
        Ok(DeliveryReceipt {
            topic: topic.to_string(),
            partition: 0,
            offset: published.len() as i64 - 1,
        })
    }

    async fn close(&self) {
        self.broker.closes.fetch_add(1, Ordering::SeqCst);
    }
}
