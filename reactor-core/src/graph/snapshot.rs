//! Graph Snapshots
//!
//! A snapshot is a plain-data copy of the graph that can be inspected or
//! serialized without holding on to the runtime.

use serde::{Deserialize, Serialize};

use super::node::{Node, NodeId, NodeKind, NodeState};

/// Serializable view of a single node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub kind: NodeKind,
    pub label: Option<String>,
    pub state: NodeState,
    pub stale_count: usize,
    pub input_changed: bool,
    pub inputs: Vec<NodeId>,
    pub outputs: Vec<NodeId>,
}

impl NodeSnapshot {
    pub(crate) fn capture(id: NodeId, node: &Node) -> Self {
        Self {
            id,
            kind: node.kind(),
            label: node.label().map(str::to_owned),
            state: node.state(),
            stale_count: node.stale_count(),
            input_changed: node.input_changed(),
            inputs: node.inputs().iter().copied().collect(),
            outputs: node.outputs().iter().copied().collect(),
        }
    }
}

/// Serializable view of every live node, in arena order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeSnapshot>,
}

impl GraphSnapshot {
    /// Look up a node by handle.
    pub fn node(&self, id: NodeId) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Find the first node carrying `label`.
    pub fn labeled(&self, label: &str) -> Option<&NodeSnapshot> {
        self.nodes
            .iter()
            .find(|node| node.label.as_deref() == Some(label))
    }

    /// Check that `a` lists `b` as an input exactly when `b` lists `a` as an
    /// output, and that no edge points at a node outside the snapshot.
    pub fn is_symmetric(&self) -> bool {
        self.nodes.iter().all(|node| {
            node.inputs.iter().all(|input| {
                self.node(*input)
                    .is_some_and(|other| other.outputs.contains(&node.id))
            }) && node.outputs.iter().all(|output| {
                self.node(*output)
                    .is_some_and(|other| other.inputs.contains(&node.id))
            })
        })
    }

    /// Check that no node has pending propagation state.
    pub fn is_settled(&self) -> bool {
        self.nodes
            .iter()
            .all(|node| node.state == NodeState::Clean && !node.input_changed)
    }

    /// Render the snapshot as pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
