//! Component wiring for the standalone virtualizer.

use crate::broker::{BrokerAdapter, InMemoryBroker};
use crate::config::Config;
use crate::listener::{DestinationListenerManager, ListenerRegistry, MessageDispatcher};
use crate::response::{ResponseService, WebhookClient};
use crate::stub::{InMemoryStubStore, StubRecord, StubService, StubStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// The broker, listener machinery and stub service of one process
pub struct MqVirtualizer {
    broker: InMemoryBroker,
    store: Arc<dyn StubStore>,
    stubs: Arc<StubService>,
}

impl MqVirtualizer {
    pub fn new(config: &Config) -> Result<Self, anyhow::Error> {
        Self::with_broker(InMemoryBroker::new(config.broker.in_memory_options()), config)
    }

    /// Wire every component around an existing broker
    pub fn with_broker(broker: InMemoryBroker, config: &Config) -> Result<Self, anyhow::Error> {
        let adapter: Arc<dyn BrokerAdapter> = Arc::new(broker.clone());
        let webhook = WebhookClient::new(config.response.webhook_timeout())?;
        let registry = Arc::new(ListenerRegistry::new());
        let dispatcher = Arc::new(MessageDispatcher::new(
            Arc::clone(&adapter),
            Arc::clone(&registry),
            ResponseService::new(Arc::clone(&adapter), webhook),
        ));
        let listeners = Arc::new(DestinationListenerManager::new(
            adapter,
            registry,
            dispatcher,
            config.listener.normalized(),
        ));
        let store: Arc<dyn StubStore> = Arc::new(InMemoryStubStore::new());
        let stubs = Arc::new(StubService::new(Arc::clone(&store), listeners));

        Ok(Self {
            broker,
            store,
            stubs,
        })
    }

    pub fn broker(&self) -> &InMemoryBroker {
        &self.broker
    }

    pub fn stubs(&self) -> &Arc<StubService> {
        &self.stubs
    }

    pub fn listeners(&self) -> &Arc<DestinationListenerManager> {
        self.stubs.listeners()
    }

    /// Store the seed stubs and register every ACTIVE one.
    ///
    /// Seeds are stored as given, without the priority check applied to API
    /// creates. Duplicate ids are skipped. Returns the number of listeners
    /// registered.
    pub async fn start(&self, seeds: Vec<StubRecord>) -> usize {
        for mut stub in seeds {
            if stub.id.trim().is_empty() {
                stub.id = uuid::Uuid::new_v4().to_string();
            }
            let now = Utc::now();
            stub.created_at = now;
            stub.updated_at = now;

            let id = stub.id.clone();
            if let Err(e) = self.store.insert(stub) {
                warn!(stub_id = %id, error = %e, "Skipping seed stub");
            }
        }

        let registered = self.stubs.initialize().await;
        info!(
            broker = %self.broker.flavor(),
            stubs = self.stubs.list().len(),
            listeners = registered,
            "Virtualizer started"
        );
        registered
    }

    /// Stop every subscription
    pub async fn shutdown(&self) {
        self.listeners().shutdown().await;
        info!("Virtualizer stopped");
    }
}
