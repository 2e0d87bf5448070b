//! Stub matching engine.
//!
//! Given one inbound message and the set of live stubs, pick at most one stub.
//! Matching is a pure function of its inputs; predicates are compiled when a
//! stub is registered so per-message work is limited to comparisons.
//!
//! # Module Structure
//!
//! - `cached` - Pre-folded pattern values (CachedValue)
//! - `destination` - Broker address normalization
//! - `selector` - `key=value` / property pattern selector subset
//! - `content` - Body predicates (NONE, CONTAINS, EXACT, REGEX)
//! - `body` - JSONPath / XPath body criteria
//! - `engine` - Filter pipeline and priority selection

mod body;
mod cached;
mod content;
mod destination;
mod engine;
mod selector;

pub use body::CompiledBodyCriterion;
pub use cached::CachedValue;
pub use content::CompiledContentMatch;
pub use destination::{destination_matches, extract_destination_name};
pub use engine::{find_matching_stub, CompiledStub};
pub use selector::CompiledSelector;
