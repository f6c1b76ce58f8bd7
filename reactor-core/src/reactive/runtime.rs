//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects atoms, calcs, and
//! effects. It owns the dependency graph, the tracking context stack and the
//! bookkeeping for the propagation pass in progress.
//!
//! # How It Works
//!
//! 1. When a calc or effect runs, the runtime pushes a tracking entry. Every
//!    node read while the entry is on top becomes an input of the running
//!    computation.
//!
//! 2. When an atom is written, the runtime runs a two-phase pass over
//!    everything reachable from it:
//!    a. Stale phase: each descendant counts incoming stale signals and
//!       forwards only the first one, so a shared descendant in a diamond
//!       is marked once.
//!    b. Fresh phase: each descendant resolves once its count drops back to
//!       zero. It recomputes only if some input reported a change, and
//!       reports a change downstream only if its own value differs.
//!
//! 3. The pass finishes before `set` returns. There is no deferred queue.
//!
//! 4. A computation that fails keeps its previous value and counts as
//!    unchanged. The pass still settles every other node, and `set` returns
//!    the first error.
//!
//! Both phases walk the graph with an explicit worklist, so long chains do
//! not grow the call stack.
//!
//! # Thread Model
//!
//! Each thread has its own runtime in thread-local storage. Handles are not
//! `Send`, so a graph never spans threads.
//!
//! # Borrowing
//!
//! User computations may read and write other nodes, so no `RefCell` borrow
//! of the runtime is ever held while user code runs. Every step borrows,
//! updates one node, copies out the neighbors it needs, and releases.

use std::cell::RefCell;

use indexmap::IndexSet;
use smallvec::SmallVec;

use super::context::{ContextStack, ReactiveContext};
use crate::config::{RecoveryMode, RuntimeConfig};
use crate::error::{Error, Result};
use crate::graph::{
    FreshStep, Graph, GraphSnapshot, Node, NodeId, NodeKind, NodeState, Recompute, StaleStep,
};

thread_local! {
    static RUNTIME: Runtime = Runtime::new();
}

type Neighbors = SmallVec<[NodeId; 8]>;

/// Bookkeeping for the outermost write currently propagating.
#[derive(Debug, Default)]
struct Pass {
    /// Nesting depth; writes made inside computations join the outer pass.
    depth: usize,
    /// Every node that received a counted stale signal.
    touched: IndexSet<NodeId>,
    recomputed: usize,
}

/// Ends a pass when dropped, including when a computation panics.
struct PassGuard {
    source: NodeId,
    succeeded: bool,
}

impl PassGuard {
    fn begin(source: NodeId) -> Self {
        Runtime::with(|rt| rt.pass.borrow_mut().depth += 1);
        Self {
            source,
            succeeded: false,
        }
    }
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        Runtime::with(|rt| rt.end_pass(self.source, self.succeeded));
    }
}

/// Swaps in the reads collected by a tracked run when dropped.
///
/// Runs on every exit path; an unwinding computation counts as failed.
struct InputSwap {
    node: NodeId,
    context: Option<ReactiveContext>,
    succeeded: bool,
}

impl InputSwap {
    fn begin(node: NodeId) -> Self {
        Self {
            node,
            context: Some(ReactiveContext::enter(Some(node))),
            succeeded: false,
        }
    }
}

impl Drop for InputSwap {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            let collected = context.finish();
            let (node, succeeded) = (self.node, self.succeeded);
            Runtime::with(|rt| rt.swap_inputs(node, collected, succeeded));
        }
    }
}

/// The per-thread reactive runtime.
///
/// All operations are associated functions that act on the current thread's
/// instance.
pub struct Runtime {
    graph: RefCell<Graph>,
    pub(super) context: RefCell<ContextStack>,
    config: RefCell<RuntimeConfig>,
    pass: RefCell<Pass>,
}

impl Runtime {
    fn new() -> Self {
        Self {
            graph: RefCell::new(Graph::new()),
            context: RefCell::new(ContextStack::default()),
            config: RefCell::new(RuntimeConfig::default()),
            pass: RefCell::new(Pass::default()),
        }
    }

    pub(crate) fn with<R>(f: impl FnOnce(&Runtime) -> R) -> R {
        RUNTIME.with(f)
    }

    // ------------------------------------------------------------------------
    // Configuration and introspection
    // ------------------------------------------------------------------------

    /// Replace this thread's configuration.
    pub fn configure(config: RuntimeConfig) {
        Self::with(|rt| *rt.config.borrow_mut() = config);
    }

    /// Get a copy of this thread's configuration.
    pub fn config() -> RuntimeConfig {
        Self::with(|rt| rt.config.borrow().clone())
    }

    /// Get the computation currently collecting reads, if any.
    pub fn current() -> Option<NodeId> {
        Self::with(|rt| rt.context.borrow().current())
    }

    /// Check if a computation is currently collecting reads.
    pub fn is_tracking() -> bool {
        Self::current().is_some()
    }

    /// Get the number of live nodes on this thread.
    pub fn node_count() -> usize {
        Self::with(|rt| rt.graph.borrow().len())
    }

    /// Check whether a handle still refers to a live node.
    pub fn contains(id: NodeId) -> bool {
        Self::with(|rt| rt.graph.borrow().contains(id))
    }

    pub fn state(id: NodeId) -> NodeState {
        Self::with(|rt| {
            rt.graph
                .borrow()
                .get(id)
                .map_or(NodeState::Disposed, Node::state)
        })
    }

    pub fn label_of(id: NodeId) -> Option<String> {
        Self::with(|rt| {
            rt.graph
                .borrow()
                .get(id)
                .and_then(Node::label)
                .map(str::to_owned)
        })
    }

    /// Nodes `id` read during its last successful computation.
    pub fn inputs(id: NodeId) -> Vec<NodeId> {
        Self::with(|rt| {
            rt.graph
                .borrow()
                .get(id)
                .map(|node| node.inputs().iter().copied().collect())
                .unwrap_or_default()
        })
    }

    /// Nodes that currently read `id`.
    pub fn outputs(id: NodeId) -> Vec<NodeId> {
        Self::with(|rt| rt.outputs_of(id).into_vec())
    }

    /// Capture a serializable view of this thread's graph.
    pub fn snapshot() -> GraphSnapshot {
        Self::with(|rt| rt.graph.borrow().snapshot())
    }

    /// Attach a debug label, surfaced in cycle errors.
    pub fn set_label(id: NodeId, label: impl Into<String>) -> Result<()> {
        let label = label.into();
        Self::with(|rt| match rt.graph.borrow_mut().get_mut(id) {
            Some(node) => {
                node.set_label(label);
                Ok(())
            }
            None => Err(Error::Disposed(id)),
        })
    }

    // ------------------------------------------------------------------------
    // Node lifecycle
    // ------------------------------------------------------------------------

    pub(crate) fn create(kind: NodeKind) -> NodeId {
        let id = Self::with(|rt| rt.graph.borrow_mut().insert(Node::new(kind)));
        tracing::trace!(node = %id, ?kind, "node created");
        id
    }

    pub(crate) fn install(id: NodeId, recompute: Recompute) {
        Self::with(|rt| {
            if let Some(node) = rt.graph.borrow_mut().get_mut(id) {
                node.install(recompute);
            }
        });
    }

    /// Sever every edge of `id` and remove it from the graph.
    ///
    /// The node stops taking part in propagation for good. Disposing an
    /// already disposed node does nothing.
    pub fn dispose(id: NodeId) {
        let removed = Self::with(|rt| rt.graph.borrow_mut().remove(id));
        // Dropped outside the borrow: the recompute closure may own handles
        // whose destructors touch the runtime.
        if let Some(node) = removed {
            tracing::trace!(node = %id, label = ?node.label(), "node disposed");
        }
    }

    // ------------------------------------------------------------------------
    // Tracking
    // ------------------------------------------------------------------------

    /// Register a read of `id` by the running computation, if any.
    ///
    /// Reading the running computation itself, or a node that still has
    /// stale signals outstanding, is reported as a cycle. The read node's
    /// transient state is reset so it stays usable afterwards.
    pub(crate) fn observe(id: NodeId) -> Result<()> {
        Self::with(|rt| {
            let Some(active) = rt.context.borrow().current() else {
                return Ok(());
            };

            let mut graph = rt.graph.borrow_mut();
            let Some(node) = graph.get_mut(id) else {
                return Ok(());
            };

            if active == id || node.stale_count() > 0 {
                node.reset_transient();
                let label = graph
                    .get(active)
                    .and_then(Node::label)
                    .map(str::to_owned)
                    .unwrap_or_else(|| rt.config.borrow().unlabeled.clone());
                tracing::warn!(node = %active, read = %id, label = %label, "cycle detected");
                return Err(Error::CycleDetected {
                    label,
                    node: active,
                });
            }

            node.add_output(active);
            rt.context.borrow_mut().record(id);
            Ok(())
        })
    }

    /// Run `f` as the computation of `node`, collecting its reads.
    ///
    /// On success the collected reads replace the previous inputs and
    /// dropped inputs are unsubscribed. On failure or panic the previous
    /// inputs stay and reads made before the failure are unsubscribed again.
    pub(crate) fn track<R>(node: NodeId, f: impl FnOnce() -> Result<R>) -> Result<R> {
        let mut swap = InputSwap::begin(node);
        let result = f();
        swap.succeeded = result.is_ok();
        drop(swap);
        result
    }

    fn swap_inputs(&self, node_id: NodeId, collected: IndexSet<NodeId>, succeeded: bool) {
        let mut graph = self.graph.borrow_mut();
        let collected: IndexSet<NodeId> = collected
            .into_iter()
            .filter(|input| graph.contains(*input))
            .collect();

        let detached: Neighbors = match graph.get_mut(node_id) {
            // Disposed while running: nothing may keep pointing at it.
            None => collected.into_iter().collect(),
            Some(node) if succeeded => {
                let previous = node.replace_inputs(collected);
                previous
                    .into_iter()
                    .filter(|input| !node.inputs().contains(input))
                    .collect()
            }
            Some(node) => collected
                .into_iter()
                .filter(|input| !node.inputs().contains(input))
                .collect(),
        };

        for input in detached {
            graph.remove_edge(input, node_id);
        }
    }

    // ------------------------------------------------------------------------
    // Propagation
    // ------------------------------------------------------------------------

    /// Write to a source node and settle everything downstream.
    ///
    /// `assign` stores the new value between the stale and fresh phases.
    /// Writing to a disposed node only runs `assign`.
    pub(crate) fn write(id: NodeId, assign: impl FnOnce()) -> Result<()> {
        if !Self::contains(id) {
            assign();
            return Ok(());
        }

        let mut pass = PassGuard::begin(id);
        Self::mark_stale(id);
        assign();
        let result = Self::mark_fresh(id, true);
        pass.succeeded = result.is_ok();
        result
    }

    fn mark_stale(root: NodeId) {
        let mut pending = vec![root];
        while let Some(id) = pending.pop() {
            let outputs = Self::with(|rt| {
                let mut graph = rt.graph.borrow_mut();
                let Some(node) = graph.get_mut(id) else {
                    return Neighbors::new();
                };

                let step = node.mark_stale();
                if rt.tracing_enabled() {
                    tracing::trace!(node = %id, ?step, stale_count = node.stale_count(), "stale");
                }
                match step {
                    StaleStep::Ignored => Neighbors::new(),
                    StaleStep::Counted => {
                        rt.pass.borrow_mut().touched.insert(id);
                        Neighbors::new()
                    }
                    StaleStep::Forward => {
                        rt.pass.borrow_mut().touched.insert(id);
                        node.outputs().iter().copied().collect()
                    }
                }
            });

            // Reversed so outputs are visited in subscription order.
            pending.extend(outputs.into_iter().rev());
        }
    }

    /// Resolve `root` and everything downstream of it.
    ///
    /// A failing computation keeps its previous value and reports "unchanged"
    /// to its outputs, so the rest of the pass still settles. The first error
    /// is returned once every node has been resolved.
    fn mark_fresh(root: NodeId, changed: bool) -> Result<()> {
        let mut pending = vec![(root, changed)];
        let mut first_error = None;

        while let Some((id, changed)) = pending.pop() {
            let step = Self::with(|rt| {
                rt.graph
                    .borrow_mut()
                    .get_mut(id)
                    .map(|node| node.mark_fresh(changed))
            });

            let changed = match step {
                None | Some(FreshStep::Ignored) | Some(FreshStep::Pending) => continue,
                Some(FreshStep::Settled { changed }) => changed,
                Some(FreshStep::Recompute(recompute)) => {
                    if Self::with(Runtime::tracing_enabled) {
                        tracing::trace!(node = %id, "recompute");
                    }
                    let result = Self::track(id, || recompute());
                    Self::with(|rt| {
                        if let Some(node) = rt.graph.borrow_mut().get_mut(id) {
                            node.finish_recompute();
                        }
                        rt.pass.borrow_mut().recomputed += 1;
                    });
                    match result {
                        Ok(changed) => changed,
                        Err(err) => {
                            tracing::debug!(node = %id, %err, "recompute failed");
                            if first_error.is_none() {
                                first_error = Some(err);
                            }
                            false
                        }
                    }
                }
            };

            let outputs = Self::with(|rt| rt.outputs_of(id));
            pending.extend(outputs.into_iter().rev().map(|output| (output, changed)));
        }

        first_error.map_or(Ok(()), Err)
    }

    fn end_pass(&self, source: NodeId, succeeded: bool) {
        let mut pass = self.pass.borrow_mut();
        pass.depth = pass.depth.saturating_sub(1);
        if pass.depth > 0 {
            return;
        }
        let touched = std::mem::take(&mut pass.touched);
        let recomputed = std::mem::take(&mut pass.recomputed);
        drop(pass);

        if self.config.borrow().recovery == RecoveryMode::Subgraph {
            let mut graph = self.graph.borrow_mut();
            let mut reset = 0usize;
            for id in &touched {
                if let Some(node) = graph.get_mut(*id) {
                    if node.state() != NodeState::Clean || node.input_changed() {
                        node.reset_transient();
                        reset += 1;
                    }
                }
            }
            if reset > 0 {
                tracing::warn!(%source, reset, succeeded, "reset pending propagation state");
            }
        }

        tracing::debug!(
            %source,
            touched = touched.len(),
            recomputed,
            succeeded,
            "propagation settled"
        );
    }

    fn outputs_of(&self, id: NodeId) -> Neighbors {
        self.graph
            .borrow()
            .get(id)
            .map(|node| node.outputs().iter().copied().collect())
            .unwrap_or_default()
    }

    fn tracing_enabled(&self) -> bool {
        self.config.borrow().trace_propagation
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// A derived node that reads `sources` and counts its recomputations.
    fn derived_over(sources: Vec<NodeId>, runs: Rc<Cell<usize>>) -> NodeId {
        let id = Runtime::create(NodeKind::Derived);
        let read_all = move || -> Result<()> {
            for source in &sources {
                Runtime::observe(*source)?;
            }
            Ok(())
        };
        Runtime::track(id, &read_all).unwrap();
        Runtime::install(
            id,
            Rc::new(move || {
                read_all()?;
                runs.set(runs.get() + 1);
                Ok(true)
            }),
        );
        id
    }

    #[test]
    fn read_outside_tracking_registers_nothing() {
        let source = Runtime::create(NodeKind::Source);
        Runtime::observe(source).unwrap();
        assert!(Runtime::outputs(source).is_empty());
        assert!(!Runtime::is_tracking());
    }

    #[test]
    fn track_registers_symmetric_edges() {
        let source = Runtime::create(NodeKind::Source);
        let derived = derived_over(vec![source], Rc::default());

        assert_eq!(Runtime::outputs(source), vec![derived]);
        assert_eq!(Runtime::inputs(derived), vec![source]);
        assert!(Runtime::snapshot().is_symmetric());
    }

    #[test]
    fn write_recomputes_dependent() {
        let source = Runtime::create(NodeKind::Source);
        let runs = Rc::new(Cell::new(0));
        derived_over(vec![source], runs.clone());

        let assigned = Cell::new(false);
        Runtime::write(source, || assigned.set(true)).unwrap();

        assert!(assigned.get());
        assert_eq!(runs.get(), 1);
        assert!(Runtime::snapshot().is_settled());
    }

    #[test]
    fn shared_descendant_recomputes_once() {
        let source = Runtime::create(NodeKind::Source);
        let left = derived_over(vec![source], Rc::default());
        let right = derived_over(vec![source], Rc::default());
        let runs = Rc::new(Cell::new(0));
        derived_over(vec![left, right], runs.clone());

        Runtime::write(source, || {}).unwrap();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn failed_track_keeps_previous_inputs() {
        let old = Runtime::create(NodeKind::Source);
        let new = Runtime::create(NodeKind::Source);
        let derived = Runtime::create(NodeKind::Derived);
        Runtime::track(derived, || Runtime::observe(old)).unwrap();

        let result: Result<()> = Runtime::track(derived, || {
            Runtime::observe(new)?;
            Err(Error::msg("boom"))
        });

        assert!(result.is_err());
        assert_eq!(Runtime::inputs(derived), vec![old]);
        assert!(Runtime::outputs(new).is_empty());
        assert!(Runtime::snapshot().is_symmetric());
    }

    #[test]
    fn successful_track_prunes_unread_inputs() {
        let old = Runtime::create(NodeKind::Source);
        let new = Runtime::create(NodeKind::Source);
        let derived = Runtime::create(NodeKind::Derived);
        Runtime::track(derived, || Runtime::observe(old)).unwrap();

        Runtime::track(derived, || Runtime::observe(new)).unwrap();

        assert_eq!(Runtime::inputs(derived), vec![new]);
        assert!(Runtime::outputs(old).is_empty());
    }

    #[test]
    fn self_read_uses_placeholder_label() {
        Runtime::configure(RuntimeConfig::default().with_unlabeled("<anon>"));
        let derived = Runtime::create(NodeKind::Derived);

        let err = Runtime::track(derived, || Runtime::observe(derived)).unwrap_err();
        match err {
            Error::CycleDetected { label, node } => {
                assert_eq!(label, "<anon>");
                assert_eq!(node, derived);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(Runtime::inputs(derived).is_empty());
        assert!(Runtime::outputs(derived).is_empty());
        Runtime::configure(RuntimeConfig::default());
    }

    #[test]
    fn dispose_is_idempotent() {
        let source = Runtime::create(NodeKind::Source);
        let runs = Rc::new(Cell::new(0));
        let derived = derived_over(vec![source], runs.clone());
        let before = Runtime::node_count();

        Runtime::dispose(derived);
        Runtime::dispose(derived);

        assert_eq!(Runtime::node_count(), before - 1);
        assert_eq!(Runtime::state(derived), NodeState::Disposed);
        assert!(Runtime::outputs(source).is_empty());

        Runtime::write(source, || {}).unwrap();
        assert_eq!(runs.get(), 0);
    }

    #[test]
    fn write_to_disposed_source_only_assigns() {
        let source = Runtime::create(NodeKind::Source);
        Runtime::dispose(source);

        let assigned = Cell::new(false);
        Runtime::write(source, || assigned.set(true)).unwrap();
        assert!(assigned.get());
    }

    #[test]
    fn label_on_disposed_node_fails() {
        let source = Runtime::create(NodeKind::Source);
        Runtime::set_label(source, "a").unwrap();
        assert_eq!(Runtime::label_of(source).as_deref(), Some("a"));

        Runtime::dispose(source);
        assert!(matches!(
            Runtime::set_label(source, "b"),
            Err(Error::Disposed(id)) if id == source
        ));
    }

    #[test]
    fn failed_recompute_does_not_stop_siblings() {
        let source = Runtime::create(NodeKind::Source);
        let failing = Runtime::create(NodeKind::Derived);
        Runtime::track(failing, || Runtime::observe(source)).unwrap();
        Runtime::install(
            failing,
            Rc::new(move || {
                Runtime::observe(source)?;
                Err(Error::msg("boom"))
            }),
        );
        let runs = Rc::new(Cell::new(0));
        derived_over(vec![source], runs.clone());

        let err = Runtime::write(source, || {}).unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(runs.get(), 1);
        assert!(Runtime::snapshot().is_settled());
    }

    #[test]
    fn panicking_track_keeps_edges_symmetric() {
        let old = Runtime::create(NodeKind::Source);
        let new = Runtime::create(NodeKind::Source);
        let derived = Runtime::create(NodeKind::Derived);
        Runtime::track(derived, || Runtime::observe(old)).unwrap();

        let outcome = std::panic::catch_unwind(|| {
            Runtime::track(derived, || -> Result<()> {
                Runtime::observe(new)?;
                panic!("computation panicked");
            })
        });

        assert!(outcome.is_err());
        assert!(!Runtime::is_tracking());
        assert_eq!(Runtime::inputs(derived), vec![old]);
        assert!(Runtime::outputs(new).is_empty());
        assert!(Runtime::snapshot().is_symmetric());
    }
}
