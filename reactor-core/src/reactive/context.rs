//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a node is read, we can
//! register the running computation as one of its outputs.
//!
//! # Implementation
//!
//! The runtime owns a stack of context entries. Entering a computation pushes
//! an entry; the entry collects every node read while it is on top; leaving
//! pops it. The [`ReactiveContext`] guard pops on drop, so the stack is
//! restored on every exit path, including early returns and panics.
//!
//! An entry without a node suspends tracking: reads made under it register
//! nothing. This is how [`untrack`] works.

use indexmap::IndexSet;

use super::runtime::Runtime;
use crate::graph::NodeId;

/// An entry in the reactive context stack.
#[derive(Debug, Clone)]
struct ContextEntry {
    /// The computation that owns this entry, or `None` while untracked.
    node: Option<NodeId>,
    /// Nodes read during this computation, in first-read order.
    dependencies: IndexSet<NodeId>,
}

/// Stack of running computations.
#[derive(Debug, Default)]
pub(crate) struct ContextStack {
    entries: Vec<ContextEntry>,
}

impl ContextStack {
    pub(crate) fn push(&mut self, node: Option<NodeId>) {
        self.entries.push(ContextEntry {
            node,
            dependencies: IndexSet::new(),
        });
    }

    /// Pop the top entry and return what it collected.
    pub(crate) fn pop(&mut self, expected: Option<NodeId>) -> IndexSet<NodeId> {
        match self.entries.pop() {
            Some(entry) => {
                debug_assert_eq!(
                    entry.node, expected,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    expected, entry.node
                );
                entry.dependencies
            }
            None => IndexSet::new(),
        }
    }

    /// The computation currently collecting reads, if any.
    pub(crate) fn current(&self) -> Option<NodeId> {
        self.entries.last().and_then(|entry| entry.node)
    }

    /// Record a read on the top entry. Ignored while untracked.
    pub(crate) fn record(&mut self, dependency: NodeId) {
        if let Some(entry) = self.entries.last_mut() {
            if entry.node.is_some() {
                entry.dependencies.insert(dependency);
            }
        }
    }
}

/// Guard that pops the context when dropped.
pub(crate) struct ReactiveContext {
    node: Option<NodeId>,
    armed: bool,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given computation.
    ///
    /// Passing `None` suspends tracking until the guard is dropped.
    pub(crate) fn enter(node: Option<NodeId>) -> Self {
        Runtime::with(|rt| rt.context.borrow_mut().push(node));
        Self { node, armed: true }
    }

    /// Leave the context and return the nodes read while it was active.
    pub(crate) fn finish(mut self) -> IndexSet<NodeId> {
        self.armed = false;
        let node = self.node;
        Runtime::with(|rt| rt.context.borrow_mut().pop(node))
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if self.armed {
            let node = self.node;
            Runtime::with(|rt| {
                rt.context.borrow_mut().pop(node);
            });
        }
    }
}

/// Run `f` without registering any dependency.
///
/// Reads inside `f` behave like `peek`, even when `f` runs inside a tracked
/// computation.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::enter(None);
    f()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
