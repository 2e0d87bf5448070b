//! One live consumption binding between a stub and its destination.
//!
//! A subscription owns one broker consumer and a small pool of worker tasks
//! pulling from it. Each delivery is handed to the shared [`DeliveryHandler`]
//! and committed once the handler returns; a panic in the handler rolls the
//! delivery back so the broker redelivers it.

use super::{DeliveryHandler, ListenerError};
use crate::broker::{BrokerAdapter, Delivery, MessageConsumer};
use crate::stub::Destination;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Worker pool bounds of one subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerPoolConfig {
    /// Workers kept alive for the whole subscription lifetime
    pub min_consumers: usize,
    /// Upper bound reached while the destination has a backlog
    pub max_consumers: usize,
    /// Extra workers exit after this long without a delivery
    #[serde(with = "millis")]
    pub idle_timeout: Duration,
    /// How long `stop` waits for in-flight deliveries
    #[serde(with = "millis")]
    pub stop_timeout: Duration,
}

impl Default for ConsumerPoolConfig {
    fn default() -> Self {
        Self {
            min_consumers: 1,
            max_consumers: 5,
            idle_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(10),
        }
    }
}

impl ConsumerPoolConfig {
    /// Bounds with `1 <= min <= max`; zero timeouts fall back to the defaults
    pub fn normalized(&self) -> Self {
        let defaults = Self::default();
        let min_consumers = self.min_consumers.max(1);
        let non_zero = |value: Duration, default: Duration| {
            if value.is_zero() {
                default
            } else {
                value
            }
        };
        Self {
            min_consumers,
            max_consumers: self.max_consumers.max(min_consumers),
            idle_timeout: non_zero(self.idle_timeout, defaults.idle_timeout),
            stop_timeout: non_zero(self.stop_timeout, defaults.stop_timeout),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
    Created,
    Started,
    Stopped,
}

/// Read-only view of a subscription for the management API
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    pub stub_id: String,
    pub destination: Destination,
    pub state: SubscriptionState,
    pub active_consumers: usize,
    pub max_consumers: usize,
    pub backlog: usize,
    pub started_at: Option<DateTime<Utc>>,
}

/// State shared by the workers of one subscription
struct WorkerPool {
    stub_id: String,
    consumer: Arc<dyn MessageConsumer>,
    handler: Arc<dyn DeliveryHandler>,
    config: ConsumerPoolConfig,
    cancel: CancellationToken,
    active: AtomicUsize,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn a worker if the pool is below `limit`
    fn try_spawn(self: &Arc<Self>, core: bool, limit: usize) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        let reserved = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .is_ok();
        if !reserved {
            return false;
        }

        let pool = Arc::clone(self);
        let handle = tokio::spawn(async move { pool.run_worker(core).await });
        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
        true
    }

    async fn run_worker(self: Arc<Self>, core: bool) {
        debug!(stub_id = %self.stub_id, core, "Consumer worker started");
        loop {
            let received = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                received = tokio::time::timeout(self.config.idle_timeout, self.consumer.receive()) => received,
            };

            match received {
                Ok(Some(delivery)) => {
                    if self.consumer.backlog() > 0 {
                        self.try_spawn(false, self.config.max_consumers);
                    }
                    self.process(delivery).await;
                }
                Ok(None) => break,
                Err(_) if core => continue,
                Err(_) => break,
            }
        }
        self.active.fetch_sub(1, Ordering::AcqRel);
        debug!(stub_id = %self.stub_id, core, "Consumer worker stopped");
    }

    async fn process(&self, delivery: Delivery) {
        let outcome = AssertUnwindSafe(self.handler.handle(&delivery.message))
            .catch_unwind()
            .await;
        match outcome {
            Ok(()) => delivery.commit(),
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(
                    stub_id = %self.stub_id,
                    destination = %delivery.message.destination,
                    "Message handler panicked, rolling back for redelivery: {}",
                    reason
                );
                delivery.rollback();
            }
        }
    }
}

/// Consumption binding created for exactly one stub
pub struct ListenerSubscription {
    stub_id: String,
    destination: Destination,
    adapter: Arc<dyn BrokerAdapter>,
    pool: Arc<WorkerPool>,
    state: SubscriptionState,
    started_at: Option<DateTime<Utc>>,
}

impl ListenerSubscription {
    /// Open a consumer on `destination`. Nothing is delivered until [`start`](Self::start).
    pub async fn open(
        stub_id: impl Into<String>,
        destination: Destination,
        adapter: Arc<dyn BrokerAdapter>,
        handler: Arc<dyn DeliveryHandler>,
        config: ConsumerPoolConfig,
    ) -> Result<Self, ListenerError> {
        let stub_id = stub_id.into();
        let consumer = adapter.open_consumer(&destination).await?;
        let pool = Arc::new(WorkerPool {
            stub_id: stub_id.clone(),
            consumer,
            handler,
            config: config.normalized(),
            cancel: CancellationToken::new(),
            active: AtomicUsize::new(0),
            handles: Mutex::new(Vec::new()),
        });
        Ok(Self {
            stub_id,
            destination,
            adapter,
            pool,
            state: SubscriptionState::Created,
            started_at: None,
        })
    }

    pub fn start(&mut self) -> Result<(), ListenerError> {
        if self.state != SubscriptionState::Created {
            return Err(ListenerError::InvalidState {
                stub_id: self.stub_id.clone(),
                state: self.state,
            });
        }
        let min = self.pool.config.min_consumers;
        for _ in 0..min {
            self.pool.try_spawn(true, min);
        }
        self.state = SubscriptionState::Started;
        self.started_at = Some(Utc::now());
        info!(
            stub_id = %self.stub_id,
            destination = %self.destination,
            consumers = min,
            "Subscription started"
        );
        Ok(())
    }

    /// Stop receiving, wait for in-flight deliveries, then release the consumer.
    ///
    /// Safe to call more than once.
    pub async fn stop(&mut self) {
        if self.state == SubscriptionState::Stopped {
            return;
        }
        self.pool.cancel.cancel();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.pool.handles.lock());
        let deadline = tokio::time::Instant::now() + self.pool.config.stop_timeout;
        for handle in handles {
            let abort = handle.abort_handle();
            if tokio::time::timeout_at(deadline, handle).await.is_err() {
                warn!(
                    stub_id = %self.stub_id,
                    "Consumer worker did not finish in time, aborting"
                );
                abort.abort();
            }
        }

        self.adapter
            .close_consumer(Arc::clone(&self.pool.consumer))
            .await;
        self.state = SubscriptionState::Stopped;
        info!(stub_id = %self.stub_id, destination = %self.destination, "Subscription stopped");
    }

    pub fn stub_id(&self) -> &str {
        &self.stub_id
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn active_consumers(&self) -> usize {
        self.pool.active.load(Ordering::Acquire)
    }

    pub fn info(&self) -> SubscriptionInfo {
        SubscriptionInfo {
            stub_id: self.stub_id.clone(),
            destination: self.destination.clone(),
            state: self.state,
            active_consumers: self.active_consumers(),
            max_consumers: self.pool.config.max_consumers,
            backlog: self.pool.consumer.backlog(),
            started_at: self.started_at,
        }
    }
}

impl Drop for ListenerSubscription {
    fn drop(&mut self) {
        if self.state != SubscriptionState::Stopped {
            self.pool.cancel.cancel();
            self.pool.consumer.close();
        }
    }
}

impl std::fmt::Debug for ListenerSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSubscription")
            .field("stub_id", &self.stub_id)
            .field("destination", &self.destination)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
