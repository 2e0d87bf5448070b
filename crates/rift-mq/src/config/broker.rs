//! Broker connection and reply configuration.

use crate::broker::{BrokerFlavor, InMemoryBrokerOptions};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrokerConfig {
    #[serde(default)]
    pub flavor: BrokerFlavor,
    /// Queue manager reported in IBM MQ style addresses
    #[serde(default = "default_queue_manager")]
    pub queue_manager: String,
    /// Rollbacks tolerated before a message is dead-lettered
    #[serde(default = "default_max_redeliveries")]
    pub max_redeliveries: u32,
}

fn default_queue_manager() -> String {
    "QM1".to_string()
}

fn default_max_redeliveries() -> u32 {
    6
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            flavor: BrokerFlavor::default(),
            queue_manager: default_queue_manager(),
            max_redeliveries: default_max_redeliveries(),
        }
    }
}

impl BrokerConfig {
    pub fn in_memory_options(&self) -> InMemoryBrokerOptions {
        InMemoryBrokerOptions {
            flavor: self.flavor,
            queue_manager: self.queue_manager.clone(),
            max_redeliveries: self.max_redeliveries,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResponseConfig {
    #[serde(default = "default_webhook_timeout_ms")]
    pub webhook_timeout_ms: u64,
}

fn default_webhook_timeout_ms() -> u64 {
    10_000
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            webhook_timeout_ms: default_webhook_timeout_ms(),
        }
    }
}

impl ResponseConfig {
    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_millis(self.webhook_timeout_ms)
    }
}
