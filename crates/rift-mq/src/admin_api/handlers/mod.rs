//! Request handlers grouped by resource.

pub mod listeners;
pub mod stubs;
pub mod system;
