//! Graph Nodes
//!
//! This module defines the node types that live in the dependency graph.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;
use serde::Serialize;
use smallvec::SmallVec;

/// Unique identifier for a node in the dependency graph.
///
/// Ids come from a process-wide counter and are never reused, so a stale
/// handle can never alias a newer node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A source node (signal). These are the roots of the graph.
    /// They have no dependencies, only dependents.
    Signal,

    /// A derived node (computed). These have dependencies and may have
    /// dependents. They cache their computed value.
    Computed,

    /// An effect node. These are leaves of the graph.
    /// They have dependencies but no dependents (they produce side effects, not values).
    Effect,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeKind::Signal => "signal",
            NodeKind::Computed => "computed",
            NodeKind::Effect => "effect",
        })
    }
}

/// Staleness of a node's cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// The node's value is up-to-date.
    Clean,

    /// An upstream value changed since the last derivation. Only computeds
    /// ever hold this state; the next read re-derives.
    Stale,
}

/// A node in the dependency graph.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    state: NodeState,

    /// Nodes that this node read during its last run.
    dependencies: IndexSet<NodeId>,

    /// Nodes that read this node, in the order they first did so.
    /// Notification walks this set front to back.
    dependents: IndexSet<NodeId>,

    /// The effect that was running when this effect was created.
    parent: Option<NodeId>,

    /// Effects created while this effect was running, in creation order.
    children: SmallVec<[NodeId; 4]>,

    /// For subscriber effects: the source they exist to observe.
    observes: Option<NodeId>,
}

impl Node {
    /// Create a new node with the given kind.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            id: NodeId::new(),
            kind,
            state: match kind {
                NodeKind::Computed => NodeState::Stale, // never derived yet
                NodeKind::Signal | NodeKind::Effect => NodeState::Clean,
            },
            dependencies: IndexSet::new(),
            dependents: IndexSet::new(),
            parent: None,
            children: SmallVec::new(),
            observes: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn is_stale(&self) -> bool {
        self.state == NodeState::Stale
    }

    pub fn mark_clean(&mut self) {
        self.state = NodeState::Clean;
    }

    pub fn mark_stale(&mut self) {
        self.state = NodeState::Stale;
    }

    pub fn dependencies(&self) -> &IndexSet<NodeId> {
        &self.dependencies
    }

    pub fn dependents(&self) -> &IndexSet<NodeId> {
        &self.dependents
    }

    pub(crate) fn add_dependency(&mut self, node_id: NodeId) {
        self.dependencies.insert(node_id);
    }

    pub(crate) fn remove_dependency(&mut self, node_id: NodeId) {
        self.dependencies.shift_remove(&node_id);
    }

    pub(crate) fn take_dependencies(&mut self) -> IndexSet<NodeId> {
        std::mem::take(&mut self.dependencies)
    }

    pub(crate) fn add_dependent(&mut self, node_id: NodeId) {
        self.dependents.insert(node_id);
    }

    /// Removes a dependent while keeping the remaining notification order.
    pub(crate) fn remove_dependent(&mut self, node_id: NodeId) {
        self.dependents.shift_remove(&node_id);
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeId>) {
        self.parent = parent;
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub(crate) fn add_child(&mut self, child: NodeId) {
        self.children.push(child);
    }

    pub(crate) fn remove_child(&mut self, child: NodeId) {
        self.children.retain(|c| *c != child);
    }

    pub(crate) fn take_children(&mut self) -> SmallVec<[NodeId; 4]> {
        std::mem::take(&mut self.children)
    }

    pub fn observes(&self) -> Option<NodeId> {
        self.observes
    }

    pub(crate) fn set_observes(&mut self, source: NodeId) {
        self.observes = Some(source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_unique() {
        let id1 = NodeId::new();
        let id2 = NodeId::new();
        assert_ne!(id1, id2);
        assert!(id2.raw() > id1.raw());
    }

    #[test]
    fn computed_node_starts_stale() {
        assert!(Node::new(NodeKind::Computed).is_stale());
        assert!(!Node::new(NodeKind::Signal).is_stale());
        assert!(!Node::new(NodeKind::Effect).is_stale());
    }

    #[test]
    fn dependents_keep_insertion_order_after_removal() {
        let mut node = Node::new(NodeKind::Signal);
        let a = NodeId::new();
        let b = NodeId::new();
        let c = NodeId::new();

        node.add_dependent(a);
        node.add_dependent(b);
        node.add_dependent(c);
        node.remove_dependent(b);

        let order: Vec<_> = node.dependents().iter().copied().collect();
        assert_eq!(order, vec![a, c]);
    }

    #[test]
    fn children_are_taken_in_creation_order() {
        let mut node = Node::new(NodeKind::Effect);
        let first = NodeId::new();
        let second = NodeId::new();

        node.add_child(first);
        node.add_child(second);

        assert_eq!(node.take_children().as_slice(), &[first, second]);
        assert!(node.children().is_empty());
    }

    #[test]
    fn kinds_display_lowercase() {
        assert_eq!(NodeKind::Signal.to_string(), "signal");
        assert_eq!(NodeKind::Computed.to_string(), "computed");
        assert_eq!(NodeKind::Effect.to_string(), "effect");
    }
}
