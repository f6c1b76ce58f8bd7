//! Graph Nodes
//!
//! This module defines the node record that lives in the dependency graph
//! arena, together with the per-node halves of the stale/fresh protocol.
//!
//! A node only knows how to update its own counters. Walking the graph and
//! running recompute functions is the runtime's job, because user code must
//! never run while the arena is borrowed.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Handle to a node in the dependency graph.
///
/// A handle is an arena index plus the generation of the slot at the time the
/// node was inserted. Once the node is disposed the slot generation moves on
/// and every outstanding handle to it stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Get the arena slot index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Get the slot generation this handle was issued for.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}v{}", self.index, self.generation)
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A source node (atom). Changes only through an explicit write.
    Source,

    /// A derived node (calc). Recomputed only by propagation.
    Derived,

    /// A derived node whose value nobody reads (effect).
    Effect,
}

/// Propagation state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// No pending stale signals.
    Clean,

    /// At least one stale signal has not been matched by a fresh signal yet.
    StaleCounting,

    /// The recompute function is running.
    Recomputing,

    /// The node was disposed. Terminal.
    Disposed,
}

/// Recompute function installed on derived nodes.
///
/// Runs the user computation, stores the result, and reports whether the
/// stored value differs from the previous one.
pub(crate) type Recompute = Rc<dyn Fn() -> Result<bool>>;

/// Outcome of delivering a stale signal to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StaleStep {
    /// The node is recomputing and ignores re-entrant signals.
    Ignored,

    /// The counter went up but the node was already stale.
    Counted,

    /// First stale signal of the pass; forward to every output.
    Forward,
}

/// Outcome of delivering a fresh signal to a node.
pub(crate) enum FreshStep {
    /// Nothing to do: the node is recomputing, or had no pending stale signal.
    Ignored,

    /// Other stale signals are still outstanding.
    Pending,

    /// Resolved without recomputing; forward `changed` to every output.
    Settled { changed: bool },

    /// Resolved and an input changed; run the recompute function.
    Recompute(Recompute),
}

/// A node in the dependency graph.
pub struct Node {
    /// What kind of node this is.
    kind: NodeKind,

    /// Optional debug name, surfaced in cycle errors.
    label: Option<String>,

    /// Nodes this node read during its last successful computation.
    inputs: IndexSet<NodeId>,

    /// Nodes that currently read this node.
    outputs: IndexSet<NodeId>,

    /// Stale signals received and not yet matched by a fresh signal.
    stale_count: usize,

    /// Whether any input resolved as changed during the current pass.
    input_changed: bool,

    /// Guard against re-entrant propagation while recomputing.
    recomputing: bool,

    recompute: Option<Recompute>,
}

impl Node {
    /// Create a new node with the given kind and no recompute function.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            label: None,
            inputs: IndexSet::new(),
            outputs: IndexSet::new(),
            stale_count: 0,
            input_changed: false,
            recomputing: false,
            recompute: None,
        }
    }

    /// Create a new source node.
    #[cfg(test)]
    pub fn source() -> Self {
        Self::new(NodeKind::Source)
    }

    /// Create a new derived node.
    #[cfg(test)]
    pub fn derived() -> Self {
        Self::new(NodeKind::Derived)
    }

    /// Create a new effect node.
    #[cfg(test)]
    pub fn effect() -> Self {
        Self::new(NodeKind::Effect)
    }

    /// Get the node's kind.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Get the debug label, if one was attached.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    /// Get all inputs.
    pub fn inputs(&self) -> &IndexSet<NodeId> {
        &self.inputs
    }

    /// Get all outputs.
    pub fn outputs(&self) -> &IndexSet<NodeId> {
        &self.outputs
    }

    pub fn stale_count(&self) -> usize {
        self.stale_count
    }

    pub fn input_changed(&self) -> bool {
        self.input_changed
    }

    /// Get the current propagation state.
    pub fn state(&self) -> NodeState {
        if self.recomputing {
            NodeState::Recomputing
        } else if self.stale_count > 0 {
            NodeState::StaleCounting
        } else {
            NodeState::Clean
        }
    }

    #[cfg(test)]
    pub(crate) fn add_input(&mut self, node_id: NodeId) {
        self.inputs.insert(node_id);
    }

    pub(crate) fn remove_input(&mut self, node_id: NodeId) {
        self.inputs.shift_remove(&node_id);
    }

    pub(crate) fn add_output(&mut self, node_id: NodeId) {
        self.outputs.insert(node_id);
    }

    pub(crate) fn remove_output(&mut self, node_id: NodeId) {
        self.outputs.shift_remove(&node_id);
    }

    /// Swap in a freshly collected input set, returning the previous one.
    pub(crate) fn replace_inputs(&mut self, inputs: IndexSet<NodeId>) -> IndexSet<NodeId> {
        std::mem::replace(&mut self.inputs, inputs)
    }

    /// Drop every edge, returning `(inputs, outputs)`.
    pub(crate) fn take_edges(&mut self) -> (IndexSet<NodeId>, IndexSet<NodeId>) {
        (
            std::mem::take(&mut self.inputs),
            std::mem::take(&mut self.outputs),
        )
    }

    pub(crate) fn install(&mut self, recompute: Recompute) {
        self.recompute = Some(recompute);
    }

    /// Record one stale signal.
    pub(crate) fn mark_stale(&mut self) -> StaleStep {
        if self.recomputing {
            return StaleStep::Ignored;
        }
        self.stale_count += 1;
        if self.stale_count == 1 {
            StaleStep::Forward
        } else {
            StaleStep::Counted
        }
    }

    /// Record one fresh signal, matching an earlier stale signal.
    ///
    /// A fresh signal with no stale signal outstanding is absorbed: the
    /// counter is clamped at zero and `changed` is not recorded, so it cannot
    /// leak into the next pass.
    pub(crate) fn mark_fresh(&mut self, changed: bool) -> FreshStep {
        if self.recomputing || self.stale_count == 0 {
            return FreshStep::Ignored;
        }
        if changed {
            self.input_changed = true;
        }
        self.stale_count -= 1;
        if self.stale_count > 0 {
            return FreshStep::Pending;
        }

        match (&self.recompute, self.input_changed) {
            (Some(recompute), true) => {
                self.recomputing = true;
                FreshStep::Recompute(Rc::clone(recompute))
            }
            _ => {
                let changed = self.input_changed;
                self.input_changed = false;
                FreshStep::Settled { changed }
            }
        }
    }

    /// Leave the `Recomputing` state after the recompute function returned.
    pub(crate) fn finish_recompute(&mut self) {
        self.recomputing = false;
        self.input_changed = false;
    }

    /// Reset all transient propagation counters and flags.
    pub(crate) fn reset_transient(&mut self) {
        self.stale_count = 0;
        self.input_changed = false;
        self.recomputing = false;
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("stale_count", &self.stale_count)
            .field("input_changed", &self.input_changed)
            .field("recomputing", &self.recomputing)
            .field("has_recompute", &self.recompute.is_some())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
