//! Lifecycle Instrumentation
//!
//! The runtime reports every node it creates and disposes to the observers
//! registered with [`Runtime::add_observer`](crate::reactive::Runtime::add_observer).
//! [`DebugRegistry`] is the stock observer: it keeps the set of live nodes and
//! running counters, which is enough to assert in tests that a teardown left
//! nothing behind.
//!
//! None of this is needed for correctness.

use std::cell::{Cell, RefCell};

use indexmap::IndexMap;
use serde::Serialize;

use crate::graph::{NodeId, NodeKind};

/// Receives lifecycle notifications from a runtime.
pub trait RuntimeObserver {
    fn node_created(&self, id: NodeId, kind: NodeKind);

    fn node_disposed(&self, id: NodeId, kind: NodeKind);
}

/// Running totals kept by a [`DebugRegistry`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryCounters {
    pub created: u64,
    pub disposed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveNode {
    pub id: NodeId,
    pub kind: NodeKind,
}

/// Point-in-time view of a registry, serializable for tooling dumps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrySnapshot {
    pub live: Vec<LiveNode>,
    pub counters: RegistryCounters,
}

/// Map of live reactive nodes by id.
#[derive(Debug, Default)]
pub struct DebugRegistry {
    live: RefCell<IndexMap<NodeId, NodeKind>>,
    counters: Cell<RegistryCounters>,
}

impl DebugRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kind of the live node with this id, if any.
    pub fn by_id(&self, id: NodeId) -> Option<NodeKind> {
        self.live.borrow().get(&id).copied()
    }

    pub fn live_count(&self) -> usize {
        self.live.borrow().len()
    }

    /// Number of live nodes of one kind.
    pub fn live_of(&self, kind: NodeKind) -> usize {
        self.live.borrow().values().filter(|k| **k == kind).count()
    }

    pub fn counters(&self) -> RegistryCounters {
        self.counters.get()
    }

    /// Start tracking a node. Re-tracking a live id is ignored.
    pub fn track(&self, id: NodeId, kind: NodeKind) {
        if self.live.borrow_mut().insert(id, kind).is_none() {
            let mut counters = self.counters.get();
            counters.created += 1;
            self.counters.set(counters);
        }
    }

    /// Stop tracking a node. Returns whether it was live.
    pub fn untrack(&self, id: NodeId) -> bool {
        let removed = self.live.borrow_mut().shift_remove(&id).is_some();
        if removed {
            let mut counters = self.counters.get();
            counters.disposed += 1;
            self.counters.set(counters);
        }
        removed
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            live: self
                .live
                .borrow()
                .iter()
                .map(|(id, kind)| LiveNode { id: *id, kind: *kind })
                .collect(),
            counters: self.counters(),
        }
    }
}

impl RuntimeObserver for DebugRegistry {
    fn node_created(&self, id: NodeId, kind: NodeKind) {
        self.track(id, kind);
    }

    fn node_disposed(&self, id: NodeId, _kind: NodeKind) {
        self.untrack(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_and_untrack_update_counters() {
        let registry = DebugRegistry::new();
        let a = NodeId::new();
        let b = NodeId::new();

        registry.track(a, NodeKind::Signal);
        registry.track(b, NodeKind::Effect);
        registry.track(a, NodeKind::Signal);

        assert_eq!(registry.live_count(), 2);
        assert_eq!(registry.by_id(b), Some(NodeKind::Effect));
        assert_eq!(registry.live_of(NodeKind::Signal), 1);

        assert!(registry.untrack(a));
        assert!(!registry.untrack(a));

        assert_eq!(
            registry.counters(),
            RegistryCounters {
                created: 2,
                disposed: 1
            }
        );
    }

    #[test]
    fn snapshot_lists_live_nodes_in_creation_order() {
        let registry = DebugRegistry::new();
        let a = NodeId::new();
        let b = NodeId::new();
        registry.track(a, NodeKind::Signal);
        registry.track(b, NodeKind::Computed);

        let snapshot = registry.snapshot();
        assert_eq!(
            snapshot.live,
            vec![
                LiveNode { id: a, kind: NodeKind::Signal },
                LiveNode { id: b, kind: NodeKind::Computed },
            ]
        );
    }
}
