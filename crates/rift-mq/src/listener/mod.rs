//! Dynamic listener lifecycle.
//!
//! - `registry`: stubs currently eligible for matching
//! - `subscription`: one consumer pool bound to one stub's destination
//! - `manager`: stub id -> subscription mapping, register/unregister
//! - `dispatcher`: delivery callback shared by all subscriptions

mod dispatcher;
mod manager;
mod registry;
mod subscription;

pub use dispatcher::{DispatchOutcome, MessageDispatcher};
pub use manager::DestinationListenerManager;
pub use registry::ListenerRegistry;
pub use subscription::{
    ConsumerPoolConfig, ListenerSubscription, SubscriptionInfo, SubscriptionState,
};

use crate::broker::{BrokerError, InboundMessage};
use async_trait::async_trait;

/// Listener lifecycle errors
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error(transparent)]
    Broker(#[from] BrokerError),
    #[error("Subscription for stub {stub_id} cannot start from state {state:?}")]
    InvalidState {
        stub_id: String,
        state: SubscriptionState,
    },
}

/// Callback invoked for every delivered message.
///
/// Returning normally commits the delivery; panicking rolls it back.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    async fn handle(&self, message: &InboundMessage);
}
