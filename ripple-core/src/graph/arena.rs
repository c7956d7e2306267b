//! Graph Arena
//!
//! The arena owns every node of one runtime and all edges between them.
//! Handles elsewhere in the crate refer to nodes only by [`NodeId`], so a
//! disposed node is simply absent from the map.
//!
//! # Invalidation
//!
//! A write to a source walks its dependents depth-first, in the order they
//! subscribed:
//!
//! 1. A clean computed is marked stale and the walk continues through its
//!    own dependents.
//! 2. A computed that is already stale stops the walk: everything below it
//!    was reached the first time it went stale.
//! 3. An effect is collected (once) for the caller to run or queue.
//!
//! Nothing is recomputed here. Computeds re-derive when next read.

use std::collections::HashMap;

use indexmap::IndexSet;
use smallvec::SmallVec;

use super::node::{Node, NodeId, NodeKind};

/// The dependency graph of one runtime.
#[derive(Debug, Default)]
pub struct Graph {
    /// All nodes in the graph, indexed by ID.
    nodes: HashMap<NodeId, Node>,
}

impl Graph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    /// Add a fresh node of the given kind.
    pub fn insert(&mut self, kind: NodeKind) -> NodeId {
        let node = Node::new(kind);
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node from the graph.
    ///
    /// Also removes all edges involving this node and detaches it from its
    /// parent effect. Children are not touched; callers dispose them first.
    pub fn remove(&mut self, node_id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&node_id)?;

        for dep_id in node.dependencies() {
            if let Some(dep) = self.nodes.get_mut(dep_id) {
                dep.remove_dependent(node_id);
            }
        }

        for dependent_id in node.dependents() {
            if let Some(dependent) = self.nodes.get_mut(dependent_id) {
                dependent.remove_dependency(node_id);
            }
        }

        if let Some(parent) = node.parent().and_then(|p| self.nodes.get_mut(&p)) {
            parent.remove_child(node_id);
        }

        Some(node)
    }

    pub fn get(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    pub fn kind(&self, node_id: NodeId) -> Option<NodeKind> {
        self.nodes.get(&node_id).map(Node::kind)
    }

    /// Record that `listener` read `source`.
    ///
    /// Both directions are written together so the edge sets stay symmetric.
    /// Missing endpoints and self-edges are ignored.
    pub fn link(&mut self, source: NodeId, listener: NodeId) {
        if source == listener || !self.contains(source) || !self.contains(listener) {
            return;
        }
        if let Some(node) = self.nodes.get_mut(&source) {
            node.add_dependent(listener);
        }
        if let Some(node) = self.nodes.get_mut(&listener) {
            node.add_dependency(source);
        }
    }

    /// Drop every upstream edge of `listener`, ahead of a re-run that will
    /// record a fresh set.
    pub fn unlink_dependencies(&mut self, listener: NodeId) {
        let Some(node) = self.nodes.get_mut(&listener) else {
            return;
        };
        for dep_id in node.take_dependencies() {
            if let Some(dep) = self.nodes.get_mut(&dep_id) {
                dep.remove_dependent(listener);
            }
        }
    }

    /// Push staleness downstream from `source` and collect the effects that
    /// must re-run, in notification order.
    pub fn invalidate(&mut self, source: NodeId) -> IndexSet<NodeId> {
        let mut effects = IndexSet::new();
        let mut stack: Vec<NodeId> = match self.nodes.get(&source) {
            Some(node) => node.dependents().iter().rev().copied().collect(),
            None => return effects,
        };

        while let Some(node_id) = stack.pop() {
            let Some(node) = self.nodes.get_mut(&node_id) else {
                continue;
            };
            match node.kind() {
                NodeKind::Computed => {
                    if !node.is_stale() {
                        node.mark_stale();
                        stack.extend(node.dependents().iter().rev().copied());
                    }
                }
                NodeKind::Effect => {
                    effects.insert(node_id);
                }
                NodeKind::Signal => {}
            }
        }

        effects
    }

    pub fn is_stale(&self, node_id: NodeId) -> bool {
        self.nodes.get(&node_id).is_some_and(Node::is_stale)
    }

    pub fn mark_clean(&mut self, node_id: NodeId) {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.mark_clean();
        }
    }

    /// Register `child` as owned by `parent` for disposal ordering.
    pub fn attach_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.contains(parent) || !self.contains(child) {
            return;
        }
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.add_child(child);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.set_parent(Some(parent));
        }
    }

    /// Detach and return the children of `node_id`, in creation order.
    pub fn take_children(&mut self, node_id: NodeId) -> SmallVec<[NodeId; 4]> {
        match self.nodes.get_mut(&node_id) {
            Some(node) => node.take_children(),
            None => SmallVec::new(),
        }
    }

    pub fn set_observes(&mut self, node_id: NodeId, source: NodeId) {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.set_observes(source);
        }
    }

    /// Dependents of `source` that exist only to observe it.
    pub fn observers_of(&self, source: NodeId) -> Vec<NodeId> {
        let Some(node) = self.nodes.get(&source) else {
            return Vec::new();
        };
        node.dependents()
            .iter()
            .copied()
            .filter(|id| self.nodes.get(id).and_then(Node::observes) == Some(source))
            .collect()
    }

    pub fn dependency_count(&self, node_id: NodeId) -> usize {
        self.nodes.get(&node_id).map_or(0, |n| n.dependencies().len())
    }

    pub fn dependent_count(&self, node_id: NodeId) -> usize {
        self.nodes.get(&node_id).map_or(0, |n| n.dependents().len())
    }

    pub fn child_count(&self, node_id: NodeId) -> usize {
        self.nodes.get(&node_id).map_or(0, |n| n.children().len())
    }

    pub fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.nodes.get(&node_id).and_then(Node::parent)
    }

    /// Ids of all nodes of `kind`, oldest first.
    pub fn ids_of(&self, kind: NodeKind) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.kind() == kind)
            .map(Node::id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
