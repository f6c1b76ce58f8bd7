//! Calc Implementation
//!
//! A Calc is a derived value computed from other reactive nodes.
//!
//! # How Calcs Work
//!
//! 1. On creation, the calc runs its computation immediately, under
//!    tracking, so it has a value and a dependency set before anyone reads
//!    it.
//!
//! 2. Reading a calc never recomputes it. It returns the cached value.
//!
//! 3. When a write reaches the calc and at least one input resolved as
//!    changed, the calc recomputes once all of its inputs are fresh. Its
//!    dependents only hear "changed" if the new value differs from the old.
//!
//! # Why This Matters
//!
//! Recomputing strictly in response to propagation keeps every calc
//! consistent with its inputs at all times (no glitches), and the equality
//! check stops work from spreading past values that did not move.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use super::readable::Readable;
use super::runtime::Runtime;
use crate::error::Result;
use crate::graph::{NodeId, NodeKind};

/// A cached derived value that recomputes only through propagation.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value. The PartialEq bound decides
///   whether a recomputation counts as a change for dependents.
pub struct Calc<T> {
    /// Handle of the derived node.
    id: NodeId,

    /// The latest computed value.
    value: Rc<RefCell<T>>,
}

impl<T> Calc<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a new calc with the given computation.
    ///
    /// The computation runs before this returns. If it fails, the node is
    /// disposed and the error is returned.
    pub fn new<F>(compute: F) -> Result<Self>
    where
        F: Fn() -> Result<T> + 'static,
    {
        Self::with_kind(NodeKind::Derived, compute)
    }

    pub(crate) fn with_kind<F>(kind: NodeKind, compute: F) -> Result<Self>
    where
        F: Fn() -> Result<T> + 'static,
    {
        let id = Runtime::create(kind);
        let initial = match Runtime::track(id, &compute) {
            Ok(value) => value,
            Err(err) => {
                Runtime::dispose(id);
                return Err(err);
            }
        };

        let value = Rc::new(RefCell::new(initial));
        let cell = Rc::clone(&value);
        Runtime::install(
            id,
            Rc::new(move || {
                let next = compute()?;
                let mut latest = cell.borrow_mut();
                let changed = *latest != next;
                *latest = next;
                Ok(changed)
            }),
        );

        Ok(Self { id, value })
    }

    /// Get the calc's node handle.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the cached value.
    ///
    /// If called within a running computation, this also registers the
    /// computation as a dependent. Never recomputes.
    pub fn get(&self) -> Result<T> {
        Runtime::observe(self.id)?;
        Ok(self.peek())
    }

    /// Get the cached value without tracking dependencies.
    pub fn peek(&self) -> T {
        self.value.borrow().clone()
    }

    /// Derive another calc from this one.
    pub fn map<R, F>(&self, f: F) -> Result<Calc<R>>
    where
        R: Clone + PartialEq + 'static,
        F: Fn(&T) -> R + 'static,
    {
        let source = self.clone();
        Calc::new(move || Ok(f(&source.get()?)))
    }

    /// Sever every edge. The calc keeps its last value and never
    /// recomputes again.
    pub fn dispose(&self) {
        Runtime::dispose(self.id);
    }

    pub fn is_disposed(&self) -> bool {
        !Runtime::contains(self.id)
    }

    /// Attach a debug label and return the handle.
    pub fn label(self, name: impl Into<String>) -> Self {
        if let Err(err) = Runtime::set_label(self.id, name) {
            tracing::debug!(node = %self.id, %err, "label ignored");
        }
        self
    }
}

impl<T> Readable<T> for Calc<T>
where
    T: Clone + PartialEq + 'static,
{
    fn id(&self) -> NodeId {
        self.id
    }

    fn get(&self) -> Result<T> {
        Calc::get(self)
    }

    fn peek(&self) -> T {
        Calc::peek(self)
    }
}

impl<T> Clone for Calc<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Rc::clone(&self.value),
        }
    }
}

impl<T> Debug for Calc<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Calc")
            .field("id", &self.id)
            .field("state", &Runtime::state(self.id))
            .field("value", &*self.value.borrow())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
