//! Callback bound to every subscription.
//!
//! Every delivered message is matched against the whole live registry, not
//! only the stub whose subscription received it. Extraction and matching
//! failures are caught here and the message is treated as processed.

use super::{DeliveryHandler, ListenerRegistry};
use crate::broker::{BrokerAdapter, InboundMessage};
use crate::matcher::{extract_destination_name, find_matching_stub};
use crate::metrics;
use crate::response::{ResponseOutcome, ResponseService};
use crate::stub::StubRecord;
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of dispatching one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Matched {
        stub_id: String,
        response: ResponseOutcome,
    },
    Unmatched,
    /// An internal error was caught; the message counts as handled
    Failed { stub_id: Option<String> },
}

pub struct MessageDispatcher {
    adapter: Arc<dyn BrokerAdapter>,
    registry: Arc<ListenerRegistry>,
    responses: ResponseService,
}

impl MessageDispatcher {
    pub fn new(
        adapter: Arc<dyn BrokerAdapter>,
        registry: Arc<ListenerRegistry>,
        responses: ResponseService,
    ) -> Self {
        Self {
            adapter,
            registry,
            responses,
        }
    }

    pub async fn dispatch(&self, message: &InboundMessage) -> DispatchOutcome {
        let destination = extract_destination_name(&message.destination).to_string();
        metrics::record_received(&destination);
        debug!(
            destination = %message.destination,
            message_id = ?message.message_id,
            "Received message"
        );

        let extracted = std::panic::catch_unwind(AssertUnwindSafe(|| {
            (self.adapter.extract_props(message), message.text_content())
        }));
        let (properties, content) = match extracted {
            Ok(extracted) => extracted,
            Err(_) => {
                error!(
                    destination = %message.destination,
                    message_id = ?message.message_id,
                    "Failed to extract message content"
                );
                metrics::record_dispatch_error("extract");
                return DispatchOutcome::Failed { stub_id: None };
            }
        };

        let selected = std::panic::catch_unwind(AssertUnwindSafe(|| -> Option<Arc<StubRecord>> {
            let candidates = self.registry.snapshot();
            find_matching_stub(message, &properties, &content, &candidates)
                .map(|c| Arc::clone(&c.stub))
        }));

        let stub = match selected {
            Ok(Some(stub)) => stub,
            Ok(None) => {
                warn!(
                    destination = %message.destination,
                    message_id = ?message.message_id,
                    "No matching stub found for message"
                );
                metrics::record_unmatched(&destination);
                return DispatchOutcome::Unmatched;
            }
            Err(_) => {
                error!(
                    destination = %message.destination,
                    message_id = ?message.message_id,
                    "Error matching message to stub"
                );
                metrics::record_dispatch_error("match");
                return DispatchOutcome::Failed { stub_id: None };
            }
        };

        info!(
            stub_id = %stub.id,
            stub = %stub.label(),
            destination = %message.destination,
            "Found matching stub"
        );
        metrics::record_matched(&stub.id);

        let stub_id = stub.id.clone();
        match AssertUnwindSafe(self.responses.respond(stub, message, &content))
            .catch_unwind()
            .await
        {
            Ok(response) => DispatchOutcome::Matched { stub_id, response },
            Err(_) => {
                error!(
                    stub_id = %stub_id,
                    destination = %message.destination,
                    "Error handling response for matched stub"
                );
                metrics::record_dispatch_error("handler");
                DispatchOutcome::Failed {
                    stub_id: Some(stub_id),
                }
            }
        }
    }
}

#[async_trait]
impl DeliveryHandler for MessageDispatcher {
    async fn handle(&self, message: &InboundMessage) {
        self.dispatch(message).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::InMemoryBroker;
    use crate::response::WebhookClient;
    use crate::stub::{ContentMatch, Destination};
    use std::time::Duration;

    fn dispatcher(broker: &InMemoryBroker, registry: Arc<ListenerRegistry>) -> MessageDispatcher {
        let adapter: Arc<dyn BrokerAdapter> = Arc::new(broker.clone());
        let responses = ResponseService::new(
            Arc::clone(&adapter),
            WebhookClient::new(Duration::from_secs(1)).unwrap(),
        );
        MessageDispatcher::new(adapter, registry, responses)
    }

    #[tokio::test]
    async fn test_dispatch_matches_whole_registry() {
        let broker = InMemoryBroker::default();
        let registry = Arc::new(ListenerRegistry::new());
        registry.publish(
            StubRecord::new("s1", Destination::queue("orders"))
                .with_content_match(ContentMatch::contains("URGENT"))
                .with_priority(10)
                .with_reply_to(Destination::queue("REPLIES"))
                .with_payload("ACK-URGENT")
                .active(),
        );
        registry.publish(
            StubRecord::new("s2", Destination::queue("orders"))
                .with_priority(1)
                .with_reply_to(Destination::queue("REPLIES"))
                .with_payload("ACK-DEFAULT")
                .active(),
        );
        let dispatcher = dispatcher(&broker, registry);

        let outcome = dispatcher
            .dispatch(&InboundMessage::new("queue://ORDERS", "URGENT: ship now"))
            .await;
        assert!(matches!(outcome, DispatchOutcome::Matched { ref stub_id, .. } if stub_id == "s1"));

        let outcome = dispatcher
            .dispatch(&InboundMessage::new("queue://ORDERS", "normal order"))
            .await;
        assert!(matches!(outcome, DispatchOutcome::Matched { ref stub_id, .. } if stub_id == "s2"));

        let payloads: Vec<String> = broker.sent_messages().into_iter().map(|m| m.payload).collect();
        assert_eq!(payloads, vec!["ACK-URGENT", "ACK-DEFAULT"]);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_unmatched_message_is_logged_and_dropped() {
        let broker = InMemoryBroker::default();
        let registry = Arc::new(ListenerRegistry::new());
        registry.publish(StubRecord::new("s1", Destination::queue("orders")).active());
        let dispatcher = dispatcher(&broker, registry);

        let outcome = dispatcher
            .dispatch(&InboundMessage::new("queue://INVOICES", "x"))
            .await;
        assert_eq!(outcome, DispatchOutcome::Unmatched);
        assert!(broker.sent_messages().is_empty());
        assert!(logs_contain("No matching stub found for message"));
    }

    #[tokio::test]
    async fn test_selector_sees_jms_identity_properties() {
        let broker = InMemoryBroker::default();
        let registry = Arc::new(ListenerRegistry::new());
        registry.publish(
            StubRecord::new("by-corr", Destination::queue("orders"))
                .with_selector("JMSCorrelationID='C-1'")
                .with_reply_to(Destination::queue("REPLIES"))
                .with_payload("ACK")
                .active(),
        );
        let dispatcher = dispatcher(&broker, registry);

        let outcome = dispatcher
            .dispatch(&InboundMessage::new("queue://orders", "x").with_correlation_id("C-1"))
            .await;
        assert!(matches!(outcome, DispatchOutcome::Matched { ref stub_id, .. } if stub_id == "by-corr"));

        let outcome = dispatcher
            .dispatch(&InboundMessage::new("queue://orders", "x").with_correlation_id("C-2"))
            .await;
        assert_eq!(outcome, DispatchOutcome::Unmatched);
    }

    #[tokio::test]
    async fn test_empty_registry_is_unmatched() {
        let broker = InMemoryBroker::default();
        let dispatcher = dispatcher(&broker, Arc::new(ListenerRegistry::new()));
        let outcome = dispatcher
            .dispatch(&InboundMessage::new("queue://orders", "x"))
            .await;
        assert_eq!(outcome, DispatchOutcome::Unmatched);
    }
}
