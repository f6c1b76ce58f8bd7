//! Atom Implementation
//!
//! An Atom is the leaf reactive primitive. It holds a value that changes only
//! through an explicit write.
//!
//! # How Atoms Work
//!
//! 1. When an atom is read inside a running calc or effect, the atom records
//!    that computation as one of its outputs.
//!
//! 2. When an atom is written with a value different from the current one,
//!    every transitive output is marked stale, the value is stored, and the
//!    outputs are resolved in one synchronous pass.
//!
//! 3. Writing an equal value does nothing at all. Downstream short-circuiting
//!    relies on this: a pass only starts when something really changed.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use super::calc::Calc;
use super::readable::Readable;
use super::runtime::Runtime;
use crate::error::Result;
use crate::graph::{NodeId, NodeKind};

/// A reactive source holding a value of type T.
///
/// # Example
///
/// ```rust,ignore
/// let count = Atom::new(0);
///
/// // Read the value
/// let value = count.peek();
///
/// // Update the value (settles every dependent before returning)
/// count.set(5)?;
/// ```
pub struct Atom<T> {
    /// Handle of the source node.
    id: NodeId,

    /// The current value. Shared between clones of the handle.
    value: Rc<RefCell<T>>,
}

impl<T> Atom<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a new atom with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            id: Runtime::create(NodeKind::Source),
            value: Rc::new(RefCell::new(value)),
        }
    }

    /// Get the atom's node handle.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the current value.
    ///
    /// If called within a running computation, this also registers the
    /// computation as a dependent.
    pub fn get(&self) -> Result<T> {
        Runtime::observe(self.id)?;
        Ok(self.peek())
    }

    /// Get the current value without tracking dependencies.
    pub fn peek(&self) -> T {
        self.value.borrow().clone()
    }

    /// Set a new value and settle every dependent.
    ///
    /// Returns the first error raised by a dependent computation. The new
    /// value is stored regardless, and dependents that did not fail still
    /// settle.
    pub fn set(&self, value: T) -> Result<()> {
        let unchanged = *self.value.borrow() == value;
        if unchanged {
            return Ok(());
        }

        let cell = Rc::clone(&self.value);
        Runtime::write(self.id, move || {
            *cell.borrow_mut() = value;
        })
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&T) -> T,
    {
        let next = {
            let current = self.value.borrow();
            f(&*current)
        };
        self.set(next)
    }

    /// Derive a calc from this atom.
    pub fn map<R, F>(&self, f: F) -> Result<Calc<R>>
    where
        R: Clone + PartialEq + 'static,
        F: Fn(&T) -> R + 'static,
    {
        let source = self.clone();
        Calc::new(move || Ok(f(&source.get()?)))
    }

    /// Sever every edge and stop propagating writes.
    ///
    /// The handle keeps its last value; `peek` and `set` still work locally.
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

impl<T> Readable<T> for Atom<T>
where
    T: Clone + PartialEq + 'static,
{
    fn id(&self) -> NodeId {
        self.id
    }

    fn get(&self) -> Result<T> {
        Atom::get(self)
    }

    fn peek(&self) -> T {
        Atom::peek(self)
    }
}

impl<T> Clone for Atom<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Rc::clone(&self.value),
        }
    }
}

impl<T> Default for Atom<T>
where
    T: Clone + PartialEq + Default + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Debug for Atom<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Atom")
            .field("id", &self.id)
            .field("value", &*self.value.borrow())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
