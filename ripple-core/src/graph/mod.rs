//! Dependency Graph
//!
//! This module implements the dependency graph that tracks relationships
//! between reactive values and computations.
//!
//! # Overview
//!
//! - Nodes represent reactive values (signals), derived values (computeds),
//!   or side effects (effects).
//! - Edges represent dependencies: if A read B during its last run, there is
//!   an edge from B to A.
//!
//! When a signal changes, we walk the graph from that signal, mark derived
//! nodes stale, and collect the effects that must re-run.
//!
//! # Design Decisions
//!
//! 1. Relationships are stored as id-based adjacency in one arena instead of
//!    references between the reactive objects themselves. A listener set
//!    never keeps a listener alive, and re-linking during a run cannot leave
//!    dangling pointers.
//!
//! 2. The graph is indexed by node ID for O(1) lookups.
//!
//! 3. We maintain both forward (dependencies) and reverse (dependents) edges
//!    to enable efficient traversal in both directions.

mod arena;
mod node;

pub use arena::Graph;
pub use node::{Node, NodeId, NodeKind, NodeState};
