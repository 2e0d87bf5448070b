//! Reply materialization for matched stubs.
//!
//! The reply goes to the stub's configured destination, or to the inbound
//! reply-to address when none is configured. Latency is honoured on a spawned
//! task so the delivering consumer is released immediately. Failures are
//! logged and reported as a [`ResponseOutcome`], never raised to the caller.

mod template;
mod webhook;

pub use template::{has_template_variables, process_template, TemplateContext};
pub use webhook::{forwarded_headers, WebhookClient, WebhookError, WebhookRequest};

use crate::broker::{BrokerAdapter, BrokerError, InboundMessage, OutboundMessage};
use crate::metrics;
use crate::stub::{Destination, StubRecord};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Reply errors
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    #[error("Webhook failed and no static payload is configured: {0}")]
    Webhook(#[from] WebhookError),
    #[error(transparent)]
    Send(#[from] BrokerError),
}

/// What happened to the reply of one matched message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    Sent { destination: Destination },
    /// Deferred by the stub's latency; the send happens on a background task
    Scheduled { delay_ms: u64 },
    /// No reply destination could be resolved
    Skipped,
    Failed(String),
}

/// Reply destination: explicit stub destination, else the inbound reply-to
pub fn resolve_reply_destination(
    stub: &StubRecord,
    message: &InboundMessage,
) -> Option<Destination> {
    stub.response
        .destination
        .clone()
        .filter(|d| !d.name.is_empty())
        .or_else(|| message.reply_to.clone())
}

/// Correlation id of the reply: inbound correlation id, else inbound message id, else a new id
pub fn reply_correlation_id(message: &InboundMessage) -> String {
    message
        .correlation_id
        .clone()
        .or_else(|| message.message_id.clone())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Builds and sends stub replies
#[derive(Clone)]
pub struct ResponseService {
    adapter: Arc<dyn BrokerAdapter>,
    webhook: WebhookClient,
}

impl ResponseService {
    pub fn new(adapter: Arc<dyn BrokerAdapter>, webhook: WebhookClient) -> Self {
        Self { adapter, webhook }
    }

    pub async fn respond(
        &self,
        stub: Arc<StubRecord>,
        message: &InboundMessage,
        content: &str,
    ) -> ResponseOutcome {
        let Some(destination) = resolve_reply_destination(&stub, message) else {
            warn!(
                stub_id = %stub.id,
                "No reply destination configured and message has no reply-to, skipping response"
            );
            metrics::record_response("skipped");
            return ResponseOutcome::Skipped;
        };

        let latency_ms = stub.response.latency_ms;
        if latency_ms == 0 {
            return self.deliver(&stub, message, content, destination).await;
        }

        metrics::record_response_latency(&stub.id, latency_ms);
        info!(stub_id = %stub.id, latency_ms, "Scheduling delayed response");
        let this = self.clone();
        let message = message.clone();
        let content = content.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(latency_ms)).await;
            this.deliver(&stub, &message, &content, destination).await;
        });
        ResponseOutcome::Scheduled {
            delay_ms: latency_ms,
        }
    }

    async fn deliver(
        &self,
        stub: &StubRecord,
        message: &InboundMessage,
        content: &str,
        destination: Destination,
    ) -> ResponseOutcome {
        let result = match self.build(stub, message, content, destination.clone()).await {
            Ok(outbound) => self.adapter.send(outbound).await.map_err(ResponseError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                info!(stub_id = %stub.id, destination = %destination, "Sent response");
                metrics::record_response("sent");
                ResponseOutcome::Sent { destination }
            }
            Err(e) => {
                error!(
                    stub_id = %stub.id,
                    destination = %destination,
                    "Error sending response: {}",
                    e
                );
                metrics::record_response("failed");
                ResponseOutcome::Failed(e.to_string())
            }
        }
    }

    async fn build(
        &self,
        stub: &StubRecord,
        message: &InboundMessage,
        content: &str,
        destination: Destination,
    ) -> Result<OutboundMessage, ResponseError> {
        let context = TemplateContext::new(stub, message, content);
        let static_payload = stub.response.payload.as_deref();

        let payload = match stub.response.webhook_url.as_deref() {
            Some(url) if !url.trim().is_empty() => {
                let properties = self.adapter.extract_props(message);
                let request = WebhookRequest {
                    url,
                    stub_id: &stub.id,
                    destination: &stub.destination.name,
                    content,
                    properties: &properties,
                };
                match self.webhook.call(&request).await {
                    Ok(body) => {
                        metrics::record_webhook_call(true);
                        body
                    }
                    Err(e) => {
                        metrics::record_webhook_call(false);
                        let Some(fallback) = static_payload else {
                            return Err(e.into());
                        };
                        warn!(stub_id = %stub.id, "Webhook failed, using static payload: {}", e);
                        process_template(fallback, &context)
                    }
                }
            }
            _ => process_template(static_payload.unwrap_or_default(), &context),
        };

        let mut outbound = OutboundMessage::new(destination, payload);
        outbound.headers = stub
            .response
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), process_template(value, &context)))
            .collect();
        outbound.correlation_id = Some(reply_correlation_id(message));
        Ok(outbound)
    }
}

impl std::fmt::Debug for ResponseService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseService")
            .field("adapter", &self.adapter.name())
            .finish_non_exhaustive()
    }
}
