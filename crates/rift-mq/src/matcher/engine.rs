//! Stub selection.
//!
//! Filters run in a fixed order: destination, selector, content, body
//! criteria, status.
//! The highest priority survivor wins; among equal priorities the first one
//! in iteration order is returned.

use super::body::CompiledBodyCriterion;
use super::content::CompiledContentMatch;
use super::destination::destination_matches;
use super::selector::CompiledSelector;
use crate::broker::InboundMessage;
use crate::stub::StubRecord;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// A stub with its predicates compiled once for repeated matching
#[derive(Debug, Clone)]
pub struct CompiledStub {
    pub stub: Arc<StubRecord>,
    content: CompiledContentMatch,
    selector: CompiledSelector,
    body: Vec<CompiledBodyCriterion>,
}

impl CompiledStub {
    pub fn compile(stub: StubRecord) -> Self {
        let content = CompiledContentMatch::compile(&stub.content_match);
        let selector = CompiledSelector::compile(stub.selector.as_deref());
        let body = stub
            .body_match_criteria
            .iter()
            .map(CompiledBodyCriterion::compile)
            .collect();
        Self {
            stub: Arc::new(stub),
            content,
            selector,
            body,
        }
    }

    pub fn id(&self) -> &str {
        &self.stub.id
    }

    fn destination_matches(&self, address: &str) -> bool {
        !self.stub.destination.name.is_empty()
            && destination_matches(address, &self.stub.destination.name)
    }

    fn selector_matches(&self, properties: &HashMap<String, String>) -> bool {
        self.selector.matches(properties)
    }

    fn content_matches(&self, content: &str) -> bool {
        self.content.matches(content)
    }

    fn body_matches(&self, content: &str) -> bool {
        self.body.iter().all(|criterion| criterion.matches(content))
    }
}

/// Pick the best stub for `message`.
///
/// `properties` is the adapter's property view of the message (headers plus
/// JMS identifiers) and `content` the text form of its body. Both are
/// extracted once by the caller.
pub fn find_matching_stub<'a>(
    message: &InboundMessage,
    properties: &HashMap<String, String>,
    content: &str,
    candidates: &'a [Arc<CompiledStub>],
) -> Option<&'a Arc<CompiledStub>> {
    candidates
        .iter()
        .filter(|c| c.destination_matches(&message.destination))
        .filter(|c| c.selector_matches(properties))
        .filter(|c| c.content_matches(content))
        .filter(|c| c.body_matches(content))
        .filter(|c| c.stub.is_active())
        .fold(None, |best: Option<&'a Arc<CompiledStub>>, candidate| {
            trace!(stub_id = %candidate.id(), priority = candidate.stub.priority, "Candidate stub");
            match best {
                Some(current) if current.stub.priority >= candidate.stub.priority => Some(current),
                _ => Some(candidate),
            }
        })
}
