//! rift-mq: message broker virtualization.
//!
//! Stubs bound to queues and topics answer inbound messages with canned or
//! webhook-generated replies. Matching is priority ordered across every live
//! stub, regardless of which subscription received the message.

pub mod admin_api;
pub mod app;
pub mod broker;
pub mod config;
pub mod listener;
pub mod matcher;
pub mod metrics;
pub mod response;
pub mod stub;

pub use app::MqVirtualizer;
