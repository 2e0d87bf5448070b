//! Decoded broker messages flowing in and out of the virtualizer.

use crate::stub::Destination;
use std::collections::HashMap;

/// Message body as decoded by the broker client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Bytes(Vec<u8>),
}

impl Payload {
    /// Text form of the body.
    ///
    /// Text payloads are returned verbatim; binary payloads use their lossy
    /// UTF-8 rendering, so content matching on them is best effort.
    pub fn as_text(&self) -> String {
        match self {
            Payload::Text(text) => text.clone(),
            Payload::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Text(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Text(value)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Payload::Bytes(value)
    }
}

/// A message delivered by the broker to one of our consumers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Destination address exactly as the broker reports it (e.g. `queue://ORDERS`)
    pub destination: String,
    pub payload: Payload,
    pub properties: HashMap<String, String>,
    pub message_id: Option<String>,
    pub correlation_id: Option<String>,
    pub reply_to: Option<Destination>,
    /// Number of times this message was rolled back and delivered again
    pub redelivery_count: u32,
}

impl InboundMessage {
    pub fn new(destination: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self {
            destination: destination.into(),
            payload: payload.into(),
            properties: HashMap::new(),
            message_id: None,
            correlation_id: None,
            reply_to: None,
            redelivery_count: 0,
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_reply_to(mut self, destination: Destination) -> Self {
        self.reply_to = Some(destination);
        self
    }

    /// Body as text (see [`Payload::as_text`])
    pub fn text_content(&self) -> String {
        self.payload.as_text()
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

/// A message the virtualizer asks the broker to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub destination: Destination,
    pub payload: String,
    pub headers: HashMap<String, String>,
    pub correlation_id: Option<String>,
    pub reply_to: Option<Destination>,
}

impl OutboundMessage {
    pub fn new(destination: Destination, payload: impl Into<String>) -> Self {
        Self {
            destination,
            payload: payload.into(),
            headers: HashMap::new(),
            correlation_id: None,
            reply_to: None,
        }
    }
}
