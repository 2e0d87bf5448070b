//! Stub persistence.

use super::types::{Destination, StubError, StubRecord, StubStatus};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Storage backend for stub definitions
pub trait StubStore: Send + Sync {
    /// Insert a new stub. Fails if the id is taken.
    fn insert(&self, stub: StubRecord) -> Result<(), StubError>;

    /// Replace an existing stub. Fails if the id is unknown.
    fn save(&self, stub: StubRecord) -> Result<(), StubError>;

    fn get(&self, id: &str) -> Option<StubRecord>;

    fn remove(&self, id: &str) -> Option<StubRecord>;

    /// All stubs, oldest first
    fn list(&self) -> Vec<StubRecord>;

    fn list_by_status(&self, status: StubStatus) -> Vec<StubRecord> {
        self.list()
            .into_iter()
            .filter(|s| s.status == status)
            .collect()
    }

    /// Highest priority stub bound to exactly this destination (name and type)
    fn find_highest_priority(&self, destination: &Destination) -> Option<StubRecord> {
        self.list()
            .into_iter()
            .filter(|s| &s.destination == destination)
            .fold(None, |best: Option<StubRecord>, stub| match best {
                Some(current) if current.priority >= stub.priority => Some(current),
                _ => Some(stub),
            })
    }
}

/// In-memory implementation of StubStore
#[derive(Debug, Default)]
pub struct InMemoryStubStore {
    stubs: RwLock<HashMap<String, StubRecord>>,
}

impl InMemoryStubStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StubStore for InMemoryStubStore {
    fn insert(&self, stub: StubRecord) -> Result<(), StubError> {
        let mut stubs = self.stubs.write();
        if stubs.contains_key(&stub.id) {
            return Err(StubError::AlreadyExists(stub.id));
        }
        stubs.insert(stub.id.clone(), stub);
        Ok(())
    }

    fn save(&self, stub: StubRecord) -> Result<(), StubError> {
        let mut stubs = self.stubs.write();
        match stubs.get_mut(&stub.id) {
            Some(existing) => {
                *existing = stub;
                Ok(())
            }
            None => Err(StubError::NotFound(stub.id)),
        }
    }

    fn get(&self, id: &str) -> Option<StubRecord> {
        self.stubs.read().get(id).cloned()
    }

    fn remove(&self, id: &str) -> Option<StubRecord> {
        self.stubs.write().remove(id)
    }

    fn list(&self) -> Vec<StubRecord> {
        let mut stubs: Vec<StubRecord> = self.stubs.read().values().cloned().collect();
        stubs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        stubs
    }
}
