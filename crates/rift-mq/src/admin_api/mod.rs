//! Admin REST API for stub and listener management.
//!
//! This module provides a REST API for:
//! - Creating, updating, toggling and deleting stubs
//! - Inspecting live listener subscriptions
//! - Publishing test messages onto the in-process broker
//! - Health and metrics endpoints
//!
//! The API listens on a configurable port (default: 8090).

mod handlers;
mod router;
mod server;
mod types;

pub use server::{serve, AdminApiServer};
