//! Lazily established, self-healing Kafka producer connection
//!
//! One `ConnectionManager` is shared by every request handler. It hands out a
//! probed publisher, rebuilds it when the broker goes away, and after a fully
//! failed retry budget refuses new connection attempts until the cooldown
//! window has passed.
use resilience::{bounded, with_retry, BoundedError, Cooldown, RetryConfig};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::producer::{DeliveryReceipt, EventPublisher, ProducerError, ProducerFactory};
use crate::error::KafkaError;

#[derive(Debug, Clone)]
pub struct ConnectionManagerConfig {
    pub retry: RetryConfig,
    pub cooldown: Duration,
    pub send_timeout: Duration,
}

impl Default for ConnectionManagerConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            cooldown: Duration::from_secs(30),
            send_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No handle cached
    Absent,
    /// A connection attempt is in progress
    Connecting,
    /// A probed handle is cached
    Healthy,
    /// The last retry budget failed and the cooldown window is still open
    UnhealthyCooldown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Broker view reported by the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct KafkaHealth {
    pub status: HealthStatus,
    /// `connected`, `not_connected` or `failed`
    pub connection_state: String,
    pub state: ConnectionState,
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl KafkaHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

struct ManagerState {
    publisher: Option<Arc<dyn EventPublisher>>,
    state: ConnectionState,
    cooldown: Cooldown,
}

pub struct ConnectionManager {
    factory: Arc<dyn ProducerFactory>,
    config: ConnectionManagerConfig,
    // Guards the cached handle and the cooldown together so concurrent
    // callers never race to replace the connection.
    inner: Mutex<ManagerState>,
}

impl ConnectionManager {
    pub fn new(factory: Arc<dyn ProducerFactory>, config: ConnectionManagerConfig) -> Self {
        let cooldown = Cooldown::new(config.cooldown);
        Self {
            factory,
            config,
            inner: Mutex::new(ManagerState {
                publisher: None,
                state: ConnectionState::Absent,
                cooldown,
            }),
        }
    }

    pub fn endpoint(&self) -> String {
        self.factory.endpoint()
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    /// Return a live publisher, reconnecting when needed.
    ///
    /// A cached handle is re-probed on every call and discarded if the probe
    /// fails. Inside the cooldown window no attempt is made at all.
    pub async fn get_producer(&self) -> Result<Arc<dyn EventPublisher>, KafkaError> {
        // The liveness check is a broker round-trip; concurrent callers must not queue behind it
        let cached = self.inner.lock().await.publisher.clone();
        if let Some(publisher) = cached {
            match publisher.probe().await {
                Ok(()) => {
                    let mut inner = self.inner.lock().await;
                    if is_current(&inner, &publisher) {
                        inner.state = ConnectionState::Healthy;
                        return Ok(publisher);
                    }
                }
                Err(e) => {
                    let discarded = {
                        let mut inner = self.inner.lock().await;
                        let current = is_current(&inner, &publisher);
                        if current {
                            inner.publisher = None;
                            inner.state = ConnectionState::Absent;
                        }
                        current
                    };
                    if discarded {
                        warn!(error = %e, "Cached Kafka producer failed its probe, reconnecting");
                        publisher.close().await;
                    }
                }
            }
        }

        let mut inner = self.inner.lock().await;

        // Another caller may have reconnected in the meantime
        if let Some(publisher) = inner.publisher.clone() {
            return Ok(publisher);
        }

        if let Some(retry_after_secs) = inner.cooldown.retry_after_secs() {
            inner.state = ConnectionState::UnhealthyCooldown;
            warn!(
                retry_after_secs,
                "Kafka connection attempt skipped, cooldown in effect"
            );
            return Err(KafkaError::CooldownRejected { retry_after_secs });
        }

        inner.state = ConnectionState::Connecting;
        match self.connect_with_retry().await {
            Ok(publisher) => {
                inner.publisher = Some(publisher.clone());
                inner.state = ConnectionState::Healthy;
                inner.cooldown.reset();
                info!(endpoint = %self.endpoint(), "Kafka producer connected");
                Ok(publisher)
            }
            Err(e) => {
                inner.cooldown.record_failure();
                inner.state = ConnectionState::UnhealthyCooldown;
                error!(
                    endpoint = %self.endpoint(),
                    error = %e,
                    cooldown_secs = self.config.cooldown.as_secs(),
                    "Kafka connection failed, entering cooldown"
                );
                Err(KafkaError::Unavailable(e.to_string()))
            }
        }
    }

    /// Publish raw bytes under `key` and wait for the acknowledgment
    pub async fn send_message(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
    ) -> Result<DeliveryReceipt, KafkaError> {
        let publisher = self.get_producer().await?;

        match bounded(
            self.config.send_timeout,
            publisher.publish(topic, key, payload),
        )
        .await
        {
            Ok(receipt) => {
                info!(
                    topic = %receipt.topic,
                    partition = receipt.partition,
                    offset = receipt.offset,
                    key,
                    "Message delivered to Kafka"
                );
                Ok(receipt)
            }
            Err(BoundedError::Elapsed(after)) => {
                error!(topic, key, ?after, "Kafka acknowledgment timed out");
                Err(KafkaError::SendFailed(format!(
                    "no acknowledgment within {}s",
                    after.as_secs()
                )))
            }
            Err(BoundedError::Inner(e)) => {
                error!(topic, key, error = %e, "Kafka publish failed");
                Err(KafkaError::SendFailed(e.to_string()))
            }
        }
    }

    /// Serialize `value` as JSON and publish it
    pub async fn send_json<T: Serialize>(
        &self,
        topic: &str,
        key: &str,
        value: &T,
    ) -> Result<DeliveryReceipt, KafkaError> {
        let payload =
            serde_json::to_vec(value).map_err(|e| KafkaError::Serialization(e.to_string()))?;
        self.send_message(topic, key, &payload).await
    }

    /// Report broker health without disturbing the cached connection.
    ///
    /// With no cached handle a throwaway connection is opened, probed and
    /// closed again. It is never stored, and it does not arm the cooldown.
    pub async fn health_check(&self) -> KafkaHealth {
        let (cached, state) = {
            let inner = self.inner.lock().await;
            (inner.publisher.clone(), inner.state)
        };
        let host = self.endpoint();

        match cached {
            Some(publisher) => match publisher.probe().await {
                Ok(()) => KafkaHealth {
                    status: HealthStatus::Healthy,
                    connection_state: "connected".to_string(),
                    state,
                    host,
                    error: None,
                },
                Err(e) => KafkaHealth {
                    status: HealthStatus::Unhealthy,
                    connection_state: "failed".to_string(),
                    state,
                    host,
                    error: Some(e.to_string()),
                },
            },
            None => match self.connect_with_retry().await {
                Ok(publisher) => {
                    publisher.close().await;
                    KafkaHealth {
                        status: HealthStatus::Healthy,
                        connection_state: "not_connected".to_string(),
                        state,
                        host,
                        error: None,
                    }
                }
                Err(e) => KafkaHealth {
                    status: HealthStatus::Unhealthy,
                    connection_state: "failed".to_string(),
                    state,
                    host,
                    error: Some(e.into_last_error().to_string()),
                },
            },
        }
    }

    /// Flush and drop the cached handle. Safe to call repeatedly.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(publisher) = inner.publisher.take() {
            publisher.close().await;
            info!("Kafka producer connection closed");
        }
        inner.state = ConnectionState::Absent;
    }

    async fn connect_with_retry(
        &self,
    ) -> Result<Arc<dyn EventPublisher>, resilience::RetryError<ProducerError>> {
        let max_attempts = self.config.retry.attempts();
        let endpoint = self.endpoint();

        with_retry(&self.config.retry, |attempt| {
            let endpoint = endpoint.clone();
            async move {
                info!(attempt, max_attempts, endpoint = %endpoint, "Connecting to Kafka");
                let publisher = self.factory.connect().await?;
                if let Err(e) = publisher.probe().await {
                    warn!(attempt, error = %e, "Kafka probe failed on fresh connection");
                    publisher.close().await;
                    return Err(e);
                }
                Ok(publisher)
            }
        })
        .await
    }
}

/// Whether `publisher` is still the handle the manager holds
fn is_current(state: &ManagerState, publisher: &Arc<dyn EventPublisher>) -> bool {
    state
        .publisher
        .as_ref()
        .is_some_and(|held| Arc::ptr_eq(held, publisher))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct DownFactory {
        attempts: AtomicU32,
    }

    #[async_trait]
    impl ProducerFactory for DownFactory {
        async fn connect(&self) -> Result<Arc<dyn EventPublisher>, ProducerError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(ProducerError::Create("connection refused".to_string()))
        }

        fn endpoint(&self) -> String {
            "localhost:9092".to_string()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_enters_cooldown() {
        let factory = Arc::new(DownFactory {
            attempts: AtomicU32::new(0),
        });
        let manager = ConnectionManager::new(factory.clone(), ConnectionManagerConfig::default());

        let err = manager.get_producer().await.err().unwrap();
        assert!(matches!(err, KafkaError::Unavailable(_)));
        assert_eq!(factory.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(manager.state().await, ConnectionState::UnhealthyCooldown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_without_connection_is_noop() {
        let factory = Arc::new(DownFactory {
            attempts: AtomicU32::new(0),
        });
        let manager = ConnectionManager::new(factory.clone(), ConnectionManagerConfig::default());

        manager.close().await;
        manager.close().await;
        assert_eq!(manager.state().await, ConnectionState::Absent);
        assert_eq!(factory.attempts.load(Ordering::SeqCst), 0);
    }
}
