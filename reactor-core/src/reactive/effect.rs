//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever the
//! values it read actually change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. An effect is a calc whose value is `()`. It recomputes under exactly
//!    the same rule: once per write, and only when some input resolved as
//!    changed.
//!
//! 3. Because `()` never differs from `()`, an effect never reports a change
//!    downstream.
//!
//! # Use Cases
//!
//! Effects synchronize reactive state with the outside world:
//!
//! - Updating a view when a cell's result changes
//! - Logging state changes
//! - Writing other atoms in response to a change

use std::cell::Cell;
use std::rc::Rc;

use super::calc::Calc;
use super::runtime::Runtime;
use crate::error::Result;
use crate::graph::{NodeId, NodeKind};

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let count = Atom::new(0);
///
/// let effect = Effect::new({
///     let count = count.clone();
///     move || {
///         println!("Count is: {}", count.get()?);
///         Ok(())
///     }
/// })?;
///
/// count.set(5)?;  // Prints: "Count is: 5"
/// ```
#[derive(Clone)]
pub struct Effect {
    /// The underlying `()`-valued computation.
    calc: Calc<()>,

    /// Number of times the effect function has been called.
    run_count: Rc<Cell<usize>>,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies.
    pub fn new<F>(run: F) -> Result<Self>
    where
        F: Fn() -> Result<()> + 'static,
    {
        let run_count = Rc::new(Cell::new(0));
        let counter = Rc::clone(&run_count);
        let calc = Calc::with_kind(NodeKind::Effect, move || {
            counter.set(counter.get() + 1);
            run()
        })?;

        Ok(Self { calc, run_count })
    }

    /// Get the effect's node handle.
    pub fn id(&self) -> NodeId {
        self.calc.id()
    }

    /// Get the number of times the effect has run, including the initial
    /// run and runs that failed.
    pub fn run_count(&self) -> usize {
        self.run_count.get()
    }

    /// Stop the effect. After disposal it never runs again.
    pub fn dispose(&self) {
        self.calc.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.calc.is_disposed()
    }

    /// Get the number of nodes the effect currently depends on.
    pub fn dependency_count(&self) -> usize {
        Runtime::inputs(self.id()).len()
    }

    /// Attach a debug label and return the handle.
    pub fn label(self, name: impl Into<String>) -> Self {
        Self {
            calc: self.calc.label(name),
            run_count: self.run_count,
        }
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::reactive::Atom;
    use std::cell::RefCell;

    #[test]
    fn effect_runs_on_creation() {
        let effect = Effect::new(|| Ok(())).unwrap();
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_reruns_when_source_changes() {
        let atom = Atom::new(0);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let effect = Effect::new({
            let atom = atom.clone();
            let seen = seen.clone();
            move || {
                seen.borrow_mut().push(atom.get()?);
                Ok(())
            }
        })
        .unwrap();

        atom.set(1).unwrap();
        atom.set(2).unwrap();

        assert_eq!(*seen.borrow(), vec![0, 1, 2]);
        assert_eq!(effect.run_count(), 3);
        assert_eq!(effect.dependency_count(), 1);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let atom = Atom::new(0);
        let effect = Effect::new({
            let atom = atom.clone();
            move || atom.get().map(drop)
        })
        .unwrap();

        effect.dispose();
        assert!(effect.is_disposed());

        atom.set(1).unwrap();
        assert_eq!(effect.run_count(), 1);
        assert!(Runtime::outputs(atom.id()).is_empty());
    }

    #[test]
    fn failing_effect_is_not_created() {
        let before = Runtime::node_count();
        let result = Effect::new(|| Err(Error::msg("no target")));
        assert!(result.is_err());
        assert_eq!(Runtime::node_count(), before);
    }

    #[test]
    fn effect_clone_shares_state() {
        let atom = Atom::new(0);
        let effect1 = Effect::new({
            let atom = atom.clone();
            move || atom.get().map(drop)
        })
        .unwrap()
        .label("watcher");
        let effect2 = effect1.clone();

        atom.set(3).unwrap();
        assert_eq!(effect2.run_count(), 2);
        assert_eq!(Runtime::label_of(effect2.id()).as_deref(), Some("watcher"));

        effect1.dispose();
        assert!(effect2.is_disposed());
    }
}
