//! Live stub index consulted by every dispatch.

use crate::matcher::CompiledStub;
use crate::stub::StubRecord;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Stubs currently backed by a live subscription, keyed by stub id.
///
/// Writers are the listener manager; readers are dispatch tasks, which work on
/// a [`snapshot`](ListenerRegistry::snapshot) so they never iterate the map
/// while it is being mutated.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    stubs: RwLock<HashMap<String, Arc<CompiledStub>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the stub under its id
    pub fn publish(&self, stub: StubRecord) -> Arc<CompiledStub> {
        let compiled = Arc::new(CompiledStub::compile(stub));
        self.stubs
            .write()
            .insert(compiled.id().to_string(), Arc::clone(&compiled));
        compiled
    }

    pub fn remove(&self, stub_id: &str) -> Option<Arc<CompiledStub>> {
        self.stubs.write().remove(stub_id)
    }

    pub fn contains(&self, stub_id: &str) -> bool {
        self.stubs.read().contains_key(stub_id)
    }

    #[cfg(test)]
    pub fn get(&self, stub_id: &str) -> Option<Arc<CompiledStub>> {
        self.stubs.read().get(stub_id).cloned()
    }

    /// Consistent copy of the live set, ordered by stub id
    pub fn snapshot(&self) -> Vec<Arc<CompiledStub>> {
        let mut stubs: Vec<Arc<CompiledStub>> = self.stubs.read().values().cloned().collect();
        stubs.sort_by(|a, b| a.id().cmp(b.id()));
        stubs
    }

    pub fn len(&self) -> usize {
        self.stubs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stubs.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::Destination;

    #[test]
    fn test_publish_replaces_by_id() {
        let registry = ListenerRegistry::new();
        registry.publish(StubRecord::new("s1", Destination::queue("A")).with_priority(1));
        registry.publish(StubRecord::new("s1", Destination::queue("A")).with_priority(7));

        assert_eq!(registry.len(), 1);
        let priorities: Vec<i32> = registry.snapshot().iter().map(|s| s.stub.priority).collect();
        assert_eq!(priorities, vec![7]);
    }

    #[test]
    fn test_remove() {
        let registry = ListenerRegistry::new();
        registry.publish(StubRecord::new("s1", Destination::queue("A")));
        assert!(registry.remove("s1").is_some());
        assert!(registry.remove("s1").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let registry = ListenerRegistry::new();
        registry.publish(StubRecord::new("b", Destination::queue("A")));
        registry.publish(StubRecord::new("a", Destination::queue("A")));

        let snapshot = registry.snapshot();
        registry.remove("a");

        let ids: Vec<&str> = snapshot.iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concurrent_publish_and_snapshot() {
        let registry = Arc::new(ListenerRegistry::new());
        let mut handles = Vec::new();
        for t in 0..4 {
            let registry = Arc::clone(&registry);
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    let id = format!("{t}-{i}");
                    registry.publish(StubRecord::new(id.clone(), Destination::queue("A")));
                    let _ = registry.snapshot();
                    if i % 2 == 0 {
                        registry.remove(&id);
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 200);
    }
}
