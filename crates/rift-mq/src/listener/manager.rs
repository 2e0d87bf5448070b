//! DestinationListenerManager - one subscription per registered stub.
//!
//! Subscriptions are created per stub rather than per destination: N active
//! stubs on one queue mean N competing consumers. Correct routing relies on
//! the dispatcher matching every delivery against the whole registry.

use super::{
    ConsumerPoolConfig, DeliveryHandler, ListenerRegistry, ListenerSubscription, SubscriptionInfo,
};
use crate::broker::BrokerAdapter;
use crate::metrics;
use crate::stub::StubRecord;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Owns every live subscription
pub struct DestinationListenerManager {
    adapter: Arc<dyn BrokerAdapter>,
    registry: Arc<ListenerRegistry>,
    handler: Arc<dyn DeliveryHandler>,
    pool: ConsumerPoolConfig,
    /// Stub id -> subscription
    subscriptions: Mutex<HashMap<String, ListenerSubscription>>,
}

impl DestinationListenerManager {
    pub fn new(
        adapter: Arc<dyn BrokerAdapter>,
        registry: Arc<ListenerRegistry>,
        handler: Arc<dyn DeliveryHandler>,
        pool: ConsumerPoolConfig,
    ) -> Self {
        Self {
            adapter,
            registry,
            handler,
            pool,
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// Start listening on the stub's destination and make the stub matchable.
    ///
    /// An existing subscription for the same stub id is torn down first.
    /// Failures are logged and reported as `false`; the stub then stays
    /// unmatched until it is registered again.
    pub async fn register(&self, stub: &StubRecord) -> bool {
        let mut subscriptions = self.subscriptions.lock().await;

        if let Some(mut existing) = subscriptions.remove(&stub.id) {
            info!(stub_id = %stub.id, "Stub already registered, unregistering first");
            existing.stop().await;
            self.registry.remove(&stub.id);
        }

        let mut subscription = match ListenerSubscription::open(
            stub.id.clone(),
            stub.destination.clone(),
            Arc::clone(&self.adapter),
            Arc::clone(&self.handler),
            self.pool.clone(),
        )
        .await
        {
            Ok(subscription) => subscription,
            Err(e) => {
                error!(
                    stub_id = %stub.id,
                    destination = %stub.destination,
                    "Error registering stub: {}",
                    e
                );
                metrics::set_active_subscriptions(subscriptions.len());
                return false;
            }
        };

        self.registry.publish(stub.clone());
        if let Err(e) = subscription.start() {
            error!(stub_id = %stub.id, "Error starting subscription: {}", e);
            self.registry.remove(&stub.id);
            subscription.stop().await;
            metrics::set_active_subscriptions(subscriptions.len());
            return false;
        }

        info!(
            stub_id = %stub.id,
            stub = %stub.label(),
            destination = %stub.destination,
            broker = %self.adapter.name(),
            "Registered stub listener"
        );
        subscriptions.insert(stub.id.clone(), subscription);
        metrics::set_active_subscriptions(subscriptions.len());
        true
    }

    /// Stop the stub's subscription and remove it from matching.
    ///
    /// Returns whether a subscription existed; unknown ids are a no-op.
    pub async fn unregister(&self, stub_id: &str) -> bool {
        let mut subscriptions = self.subscriptions.lock().await;
        let Some(mut subscription) = subscriptions.remove(stub_id) else {
            debug!(stub_id = %stub_id, "No listener registered for stub");
            self.registry.remove(stub_id);
            return false;
        };

        subscription.stop().await;
        self.registry.remove(stub_id);
        metrics::set_active_subscriptions(subscriptions.len());
        info!(stub_id = %stub_id, "Unregistered stub listener");
        true
    }

    pub async fn is_registered(&self, stub_id: &str) -> bool {
        self.subscriptions.lock().await.contains_key(stub_id)
    }

    pub async fn subscription_count(&self) -> usize {
        self.subscriptions.lock().await.len()
    }

    /// Snapshot of all subscriptions, ordered by stub id
    pub async fn subscriptions(&self) -> Vec<SubscriptionInfo> {
        let subscriptions = self.subscriptions.lock().await;
        let mut infos: Vec<SubscriptionInfo> =
            subscriptions.values().map(|s| s.info()).collect();
        infos.sort_by(|a, b| a.stub_id.cmp(&b.stub_id));
        infos
    }

    pub fn registry(&self) -> &Arc<ListenerRegistry> {
        &self.registry
    }

    /// Stop every subscription
    pub async fn shutdown(&self) {
        let drained: Vec<(String, ListenerSubscription)> =
            self.subscriptions.lock().await.drain().collect();
        let count = drained.len();
        for (stub_id, mut subscription) in drained {
            subscription.stop().await;
            self.registry.remove(&stub_id);
        }
        metrics::set_active_subscriptions(0);
        info!("Stopped {} stub listeners", count);
    }
}
