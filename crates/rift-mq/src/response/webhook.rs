//! HTTP webhook client used for dynamic reply payloads.

use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// Errors that can occur when calling a webhook
#[derive(thiserror::Error, Debug)]
pub enum WebhookError {
    #[error("Webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Webhook returned non-success status: {0}")]
    Status(u16),
}

/// Data forwarded to the webhook for one matched message
#[derive(Debug, Clone)]
pub struct WebhookRequest<'a> {
    pub url: &'a str,
    pub stub_id: &'a str,
    pub destination: &'a str,
    pub content: &'a str,
    pub properties: &'a HashMap<String, String>,
}

/// Posts inbound messages to a webhook and returns its body as the reply payload
#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: Client,
}

impl WebhookClient {
    pub fn new(timeout: Duration) -> Result<Self, WebhookError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub async fn call(&self, request: &WebhookRequest<'_>) -> Result<String, WebhookError> {
        info!(stub_id = %request.stub_id, "Calling webhook URL: {}", request.url);

        let mut builder = self
            .client
            .post(request.url)
            .header("X-Stub-ID", request.stub_id)
            .header("X-Destination", request.destination)
            .body(request.content.to_string());
        for (name, value) in forwarded_headers(request.properties) {
            builder = builder.header(name, value);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WebhookError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        debug!(stub_id = %request.stub_id, bytes = body.len(), "Webhook response received");
        Ok(body)
    }
}

/// Message properties as `X-JMS-<name>` headers.
///
/// Names starting with `JMS` or containing `-` are not forwarded.
pub fn forwarded_headers(properties: &HashMap<String, String>) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = properties
        .iter()
        .filter(|(name, _)| !name.starts_with("JMS") && !name.contains('-'))
        .map(|(name, value)| (format!("X-JMS-{name}"), value.clone()))
        .collect();
    headers.sort();
    headers
}
