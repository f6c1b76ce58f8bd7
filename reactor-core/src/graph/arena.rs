//! Node Arena
//!
//! The arena owns every node in the graph. Nodes refer to each other only by
//! [`NodeId`], so the mutual input/output references never form ownership
//! cycles.
//!
//! # Slots
//!
//! Each slot carries a generation counter. Removing a node bumps the
//! generation and puts the slot on a free list, so a handle to a disposed
//! node can never resolve to whatever node reuses the slot later.

use super::node::{Node, NodeId};
use super::snapshot::{GraphSnapshot, NodeSnapshot};

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Convert a slot count into the index of the next slot.
fn slot_index(len: usize) -> u32 {
    u32::try_from(len).unwrap_or_else(|_| panic!("node arena is full ({len} slots)"))
}

/// The dependency graph: an arena of nodes with symmetric edge sets.
#[derive(Default)]
pub struct Graph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl Graph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the graph.
    ///
    /// # Panics
    ///
    /// Panics if every free slot is taken and the arena has grown past
    /// `u32::MAX` slots.
    pub fn insert(&mut self, node: Node) -> NodeId {
        if let Some(index) = self.free.pop() {
            self.len += 1;
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeId::new(index, slot.generation);
        }

        let index = slot_index(self.slots.len());
        self.len += 1;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId::new(index, 0)
    }

    /// Remove a node from the graph.
    ///
    /// Every edge involving the node is severed on both sides before the
    /// node is handed back. Removing a node that is already gone is a no-op.
    pub fn remove(&mut self, node_id: NodeId) -> Option<Node> {
        let slot = self.slot_mut(node_id)?;
        let mut node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(node_id.index());
        self.len -= 1;

        let (inputs, outputs) = node.take_edges();
        for input in inputs {
            if let Some(dep) = self.get_mut(input) {
                dep.remove_output(node_id);
            }
        }
        for output in outputs {
            if let Some(dependent) = self.get_mut(output) {
                dependent.remove_input(node_id);
            }
        }

        Some(node)
    }

    /// Check whether a handle still refers to a live node.
    pub fn contains(&self, node_id: NodeId) -> bool {
        self.get(node_id).is_some()
    }

    /// Get a reference to a node.
    pub fn get(&self, node_id: NodeId) -> Option<&Node> {
        self.slots
            .get(node_id.index() as usize)
            .filter(|slot| slot.generation == node_id.generation())
            .and_then(|slot| slot.node.as_ref())
    }

    /// Get a mutable reference to a node.
    pub fn get_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.slot_mut(node_id).and_then(|slot| slot.node.as_mut())
    }

    fn slot_mut(&mut self, node_id: NodeId) -> Option<&mut Slot> {
        self.slots
            .get_mut(node_id.index() as usize)
            .filter(|slot| slot.generation == node_id.generation())
    }

    /// Add an edge: `output` reads `input`.
    ///
    /// Both endpoints must be live; otherwise nothing changes.
    #[cfg(test)]
    pub fn add_edge(&mut self, input: NodeId, output: NodeId) -> bool {
        if !self.contains(input) || !self.contains(output) {
            return false;
        }
        if let Some(node) = self.get_mut(input) {
            node.add_output(output);
        }
        if let Some(node) = self.get_mut(output) {
            node.add_input(input);
        }
        true
    }

    /// Remove an edge from both endpoints.
    pub fn remove_edge(&mut self, input: NodeId, output: NodeId) {
        if let Some(node) = self.get_mut(input) {
            node.remove_output(output);
        }
        if let Some(node) = self.get_mut(output) {
            node.remove_input(input);
        }
    }

    /// Iterate over live nodes in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.node
                .as_ref()
                .map(|node| (NodeId::new(index as u32, slot.generation), node))
        })
    }

    /// Get the number of live nodes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Capture a serializable view of every live node.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self
                .iter()
                .map(|(id, node)| NodeSnapshot::capture(id, node))
                .collect(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
