//! Broker capability seam.
//!
//! The virtualizer is protocol agnostic: everything it needs from a concrete
//! broker client is expressed by [`BrokerAdapter`] (open/close consumers,
//! send, property extraction) and [`MessageConsumer`] (transactional receive).
//!
//! - `message`: decoded inbound/outbound message types
//! - `flavor`: per-broker destination address rendering
//! - `inmemory`: process-local broker used by the standalone binary and tests

mod flavor;
mod inmemory;
mod message;

pub use flavor::BrokerFlavor;
pub use inmemory::{InMemoryBroker, InMemoryBrokerOptions};
pub use message::{InboundMessage, OutboundMessage, Payload};

use crate::stub::Destination;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Broker client errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrokerError {
    #[error("Destination {0} is unreachable")]
    Unreachable(String),
    #[error("Consumer for {0} is closed")]
    ConsumerClosed(String),
    #[error("Send to {destination} failed: {reason}")]
    SendFailed { destination: String, reason: String },
}

/// Transaction handle of one delivery
pub trait Acknowledge: Send {
    /// Make the consumption permanent
    fn commit(self: Box<Self>);
    /// Return the message to the broker for redelivery
    fn rollback(self: Box<Self>);
}

/// A message handed to a consumer inside a broker transaction
pub struct Delivery {
    pub message: InboundMessage,
    ack: Box<dyn Acknowledge>,
}

impl Delivery {
    pub fn new(message: InboundMessage, ack: Box<dyn Acknowledge>) -> Self {
        Self { message, ack }
    }

    pub fn commit(self) {
        self.ack.commit();
    }

    pub fn rollback(self) {
        self.ack.rollback();
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// A physical consumer bound to one destination
#[async_trait]
pub trait MessageConsumer: Send + Sync {
    /// Wait for the next delivery. Returns `None` once the consumer is closed.
    ///
    /// Must be cancel safe: dropping the future never loses a message.
    async fn receive(&self) -> Option<Delivery>;

    /// Messages waiting on the destination for this consumer
    fn backlog(&self) -> usize;

    /// Release broker resources; pending `receive` calls return `None`
    fn close(&self);
}

/// Capabilities the virtualizer needs from a broker client
#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn open_consumer(
        &self,
        destination: &Destination,
    ) -> Result<Arc<dyn MessageConsumer>, BrokerError>;

    async fn close_consumer(&self, consumer: Arc<dyn MessageConsumer>) {
        consumer.close();
    }

    async fn send(&self, message: OutboundMessage) -> Result<(), BrokerError>;

    /// Message properties plus the JMS-style identity headers
    fn extract_props(&self, message: &InboundMessage) -> HashMap<String, String> {
        let mut props = message.properties.clone();
        if let Some(ref id) = message.message_id {
            props.insert("JMSMessageID".to_string(), id.clone());
        }
        if let Some(ref id) = message.correlation_id {
            props.insert("JMSCorrelationID".to_string(), id.clone());
        }
        props
    }
}
