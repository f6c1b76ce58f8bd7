//! Dependency Graph
//!
//! This module implements the graph that records which reactive nodes read
//! which others.
//!
//! # Overview
//!
//! The graph is a general directed graph where:
//!
//! - Nodes represent atoms, calcs, or effects
//! - Edges represent reads: if B read A during its last computation, A lists
//!   B as an output and B lists A as an input
//!
//! Diamonds, fan-in and fan-out are all legal. Cycles are not prevented
//! structurally; they are reported when a computation actually reads a node
//! that is still being resolved.
//!
//! # Design Decisions
//!
//! 1. Nodes live in an arena and are addressed by generational [`NodeId`]s,
//!    so the input/output back-references never own each other.
//!
//! 2. Edge sets are insertion-ordered, which makes propagation order follow
//!    subscription order and keeps runs deterministic.
//!
//! 3. Both directions are stored so disposal and pruning are local.

mod arena;
mod node;
mod snapshot;

pub use node::{NodeId, NodeKind, NodeState};
pub use snapshot::{GraphSnapshot, NodeSnapshot};

pub(crate) use arena::Graph;
pub(crate) use node::{FreshStep, Node, Recompute, StaleStep};
