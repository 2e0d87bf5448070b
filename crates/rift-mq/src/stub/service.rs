//! Stub CRUD with listener reconciliation.
//!
//! Every state change ends with the stub registered if it is ACTIVE and
//! unregistered otherwise, so status and subscription liveness stay in step.

use super::store::StubStore;
use super::types::{StubError, StubRecord, StubStatus};
use crate::listener::DestinationListenerManager;
use crate::metrics;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

pub struct StubService {
    store: Arc<dyn StubStore>,
    listeners: Arc<DestinationListenerManager>,
}

impl StubService {
    pub fn new(store: Arc<dyn StubStore>, listeners: Arc<DestinationListenerManager>) -> Self {
        Self { store, listeners }
    }

    pub fn listeners(&self) -> &Arc<DestinationListenerManager> {
        &self.listeners
    }

    pub fn list(&self) -> Vec<StubRecord> {
        self.store.list()
    }

    pub fn list_active(&self) -> Vec<StubRecord> {
        self.store.list_by_status(StubStatus::Active)
    }

    pub fn list_by_user(&self, user_id: &str) -> Vec<StubRecord> {
        self.store
            .list()
            .into_iter()
            .filter(|s| s.user_id.as_deref() == Some(user_id))
            .collect()
    }

    pub fn get(&self, id: &str) -> Result<StubRecord, StubError> {
        self.store
            .get(id)
            .ok_or_else(|| StubError::NotFound(id.to_string()))
    }

    /// Store a new stub and start its listener when it is ACTIVE.
    ///
    /// Rejected when a stub on the same destination already has a strictly
    /// higher priority.
    pub async fn create(&self, mut stub: StubRecord) -> Result<StubRecord, StubError> {
        validate(&stub)?;
        self.check_priority(&stub)?;

        if stub.id.trim().is_empty() {
            stub.id = uuid::Uuid::new_v4().to_string();
        }
        let now = Utc::now();
        stub.created_at = now;
        stub.updated_at = now;

        self.store.insert(stub.clone())?;
        info!(stub_id = %stub.id, destination = %stub.destination, "Created stub");

        if stub.is_active() {
            self.register_listener(&stub).await;
        }
        Ok(stub)
    }

    /// Replace the stub's definition, keeping its id and creation time
    pub async fn update(&self, id: &str, mut details: StubRecord) -> Result<StubRecord, StubError> {
        let existing = self.get(id)?;
        validate(&details)?;

        details.id = existing.id;
        details.created_at = existing.created_at;
        if details.user_id.is_none() {
            details.user_id = existing.user_id;
        }
        details.updated_at = Utc::now();

        self.store.save(details.clone())?;
        info!(stub_id = %details.id, "Updated stub");
        self.reconcile(&details).await;
        Ok(details)
    }

    pub async fn toggle_status(&self, id: &str) -> Result<StubRecord, StubError> {
        let mut stub = self.get(id)?;
        stub.status = stub.status.toggled();
        stub.updated_at = Utc::now();

        self.store.save(stub.clone())?;
        info!(stub_id = %stub.id, status = ?stub.status, "Toggled stub status");
        self.reconcile(&stub).await;
        Ok(stub)
    }

    pub async fn delete(&self, id: &str) -> Result<StubRecord, StubError> {
        self.get(id)?;
        self.listeners.unregister(id).await;
        let removed = self
            .store
            .remove(id)
            .ok_or_else(|| StubError::NotFound(id.to_string()))?;
        metrics::forget_stub(id);
        info!(stub_id = %id, "Deleted stub");
        Ok(removed)
    }

    /// Register every stored ACTIVE stub. Returns the number registered.
    pub async fn initialize(&self) -> usize {
        let active = self.list_active();
        info!("Found {} active stubs", active.len());

        let mut registered = 0;
        for stub in &active {
            if self.register_listener(stub).await {
                registered += 1;
            }
        }
        registered
    }

    async fn reconcile(&self, stub: &StubRecord) {
        if stub.is_active() {
            self.register_listener(stub).await;
        } else if self.listeners.unregister(&stub.id).await {
            info!(stub_id = %stub.id, "Unregistered listener for inactive stub");
        }
    }

    async fn register_listener(&self, stub: &StubRecord) -> bool {
        let registered = self.listeners.register(stub).await;
        if !registered {
            warn!(stub_id = %stub.id, "Failed to register listener for stub");
        }
        registered
    }

    fn check_priority(&self, stub: &StubRecord) -> Result<(), StubError> {
        match self.store.find_highest_priority(&stub.destination) {
            Some(existing) if existing.priority > stub.priority => {
                Err(StubError::PriorityConflict {
                    priority: stub.priority,
                    existing_priority: existing.priority,
                    existing: existing.label().to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

fn validate(stub: &StubRecord) -> Result<(), StubError> {
    if stub.destination.name.trim().is_empty() {
        return Err(StubError::Validation(
            "destination name must not be empty".to_string(),
        ));
    }
    if let Some(ref reply) = stub.response.destination {
        if reply.name.trim().is_empty() {
            return Err(StubError::Validation(
                "response destination name must not be empty".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{InMemoryBroker, InboundMessage};
    use crate::listener::{ConsumerPoolConfig, DeliveryHandler, ListenerRegistry};
    use crate::stub::{Destination, InMemoryStubStore};
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl DeliveryHandler for Noop {
        async fn handle(&self, _message: &InboundMessage) {}
    }

    fn service(broker: &InMemoryBroker) -> StubService {
        let listeners = Arc::new(DestinationListenerManager::new(
            Arc::new(broker.clone()),
            Arc::new(ListenerRegistry::new()),
            Arc::new(Noop),
            ConsumerPoolConfig::default(),
        ));
        StubService::new(Arc::new(InMemoryStubStore::new()), listeners)
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_registers_active() {
        let broker = InMemoryBroker::default();
        let service = service(&broker);

        let created = service
            .create(StubRecord::new("", Destination::queue("ORDERS")).active())
            .await
            .unwrap();
        assert!(!created.id.is_empty());
        assert!(service.listeners().is_registered(&created.id).await);
        assert_eq!(service.get(&created.id).unwrap(), created);
    }

    #[tokio::test]
    async fn test_create_inactive_does_not_register() {
        let broker = InMemoryBroker::default();
        let service = service(&broker);

        let created = service
            .create(StubRecord::new("s1", Destination::queue("ORDERS")))
            .await
            .unwrap();
        assert!(!service.listeners().is_registered(&created.id).await);
        assert_eq!(broker.open_consumer_count(), 0);
    }

    #[tokio::test]
    async fn test_create_rejects_lower_priority() {
        let broker = InMemoryBroker::default();
        let service = service(&broker);
        service
            .create(
                StubRecord::new("high", Destination::queue("ORDERS"))
                    .with_name("primary")
                    .with_priority(10),
            )
            .await
            .unwrap();

        let err = service
            .create(StubRecord::new("low", Destination::queue("ORDERS")).with_priority(5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StubError::PriorityConflict { priority: 5, existing_priority: 10, ref existing } if existing == "primary"
        ));

        service
            .create(StubRecord::new("equal", Destination::queue("ORDERS")).with_priority(10))
            .await
            .unwrap();
        service
            .create(StubRecord::new("topic", Destination::topic("ORDERS")).with_priority(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_rejects_empty_destination() {
        let broker = InMemoryBroker::default();
        let service = service(&broker);
        let err = service
            .create(StubRecord::new("s1", Destination::queue(" ")))
            .await
            .unwrap_err();
        assert!(matches!(err, StubError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_reconciles_listener() {
        let broker = InMemoryBroker::default();
        let service = service(&broker);
        let created = service
            .create(StubRecord::new("s1", Destination::queue("ORDERS")).active())
            .await
            .unwrap();

        let moved = StubRecord::new("ignored", Destination::queue("INVOICES")).active();
        let updated = service.update("s1", moved).await.unwrap();
        assert_eq!(updated.id, "s1");
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(service.listeners().subscription_count().await, 1);
        let infos = service.listeners().subscriptions().await;
        assert_eq!(infos[0].destination, Destination::queue("INVOICES"));

        let deactivated = StubRecord::new("s1", Destination::queue("INVOICES"));
        service.update("s1", deactivated).await.unwrap();
        assert!(!service.listeners().is_registered("s1").await);
        assert_eq!(broker.open_consumer_count(), 0);
    }

    #[tokio::test]
    async fn test_update_keeps_owner_unless_replaced() {
        let broker = InMemoryBroker::default();
        let service = service(&broker);
        let mut owned = StubRecord::new("s1", Destination::queue("ORDERS"));
        owned.user_id = Some("alice".to_string());
        service.create(owned).await.unwrap();

        let updated = service
            .update("s1", StubRecord::new("s1", Destination::queue("ORDERS")).with_priority(3))
            .await
            .unwrap();
        assert_eq!(updated.user_id.as_deref(), Some("alice"));
        assert_eq!(service.list_by_user("alice").len(), 1);

        let mut handed_over = StubRecord::new("s1", Destination::queue("ORDERS"));
        handed_over.user_id = Some("bob".to_string());
        service.update("s1", handed_over).await.unwrap();
        assert!(service.list_by_user("alice").is_empty());
        assert_eq!(service.list_by_user("bob").len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_status() {
        let broker = InMemoryBroker::default();
        let service = service(&broker);
        service
            .create(StubRecord::new("s1", Destination::queue("ORDERS")))
            .await
            .unwrap();

        let toggled = service.toggle_status("s1").await.unwrap();
        assert_eq!(toggled.status, StubStatus::Active);
        assert!(service.listeners().is_registered("s1").await);

        let toggled = service.toggle_status("s1").await.unwrap();
        assert_eq!(toggled.status, StubStatus::Inactive);
        assert!(!service.listeners().is_registered("s1").await);
    }

    #[tokio::test]
    async fn test_delete_unregisters() {
        let broker = InMemoryBroker::default();
        let service = service(&broker);
        service
            .create(StubRecord::new("s1", Destination::queue("ORDERS")).active())
            .await
            .unwrap();

        service.delete("s1").await.unwrap();
        assert!(!service.listeners().is_registered("s1").await);
        assert!(matches!(service.get("s1"), Err(StubError::NotFound(_))));
        assert!(matches!(
            service.delete("s1").await,
            Err(StubError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_drops_stub_metrics() {
        let broker = InMemoryBroker::default();
        let service = service(&broker);
        service
            .create(StubRecord::new("deleted-metrics-stub", Destination::queue("ORDERS")))
            .await
            .unwrap();
        metrics::record_matched("deleted-metrics-stub");
        assert!(metrics::collect_metrics().contains("deleted-metrics-stub"));

        service.delete("deleted-metrics-stub").await.unwrap();
        assert!(!metrics::collect_metrics().contains("deleted-metrics-stub"));
    }

    #[tokio::test]
    async fn test_initialize_registers_active_stubs() {
        let broker = InMemoryBroker::default();
        let store = Arc::new(InMemoryStubStore::new());
        store
            .insert(StubRecord::new("a", Destination::queue("A")).active())
            .unwrap();
        store
            .insert(StubRecord::new("b", Destination::queue("B")))
            .unwrap();
        store
            .insert(StubRecord::new("c", Destination::topic("C")).active())
            .unwrap();

        let listeners = Arc::new(DestinationListenerManager::new(
            Arc::new(broker.clone()),
            Arc::new(ListenerRegistry::new()),
            Arc::new(Noop),
            ConsumerPoolConfig::default(),
        ));
        let service = StubService::new(store, listeners);

        assert_eq!(service.initialize().await, 2);
        assert!(service.listeners().is_registered("a").await);
        assert!(!service.listeners().is_registered("b").await);
        assert!(service.listeners().is_registered("c").await);
    }
}
