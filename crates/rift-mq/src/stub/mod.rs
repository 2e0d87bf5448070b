//! Stub definitions, storage and lifecycle.
//!
//! - `types`: the stub data model and its errors
//! - `store`: storage trait and in-memory backend
//! - `service`: CRUD operations that keep listeners in step with stub status

mod service;
mod store;
mod types;

pub use service::StubService;
pub use store::{InMemoryStubStore, StubStore};
pub use types::{
    BodyExpressionType, BodyMatchCriterion, BodyOperator, ContentMatch, ContentMatchType,
    Destination, DestinationType, StubError, StubRecord, StubResponse, StubStatus,
};
