//! Reactive Primitives
//!
//! This module implements the user-facing primitives: atoms, calcs, and
//! effects, plus the runtime that keeps them consistent.
//!
//! # Concepts
//!
//! ## Atoms
//!
//! An Atom is a container for mutable state. Reading an atom inside a
//! running calc or effect registers that computation as a dependent. Writing
//! a different value settles every dependent before the write returns.
//!
//! ## Calcs
//!
//! A Calc is a derived value. It is computed once at creation and afterwards
//! only when propagation reaches it with a changed input. Reading never
//! recomputes.
//!
//! ## Effects
//!
//! An Effect is a calc kept for its side effects. It re-runs at most once
//! per write, and only when something it read actually changed.
//!
//! # Implementation Notes
//!
//! Dependencies are discovered automatically. While a computation runs, the
//! runtime keeps it on a tracking stack; any node read at that point becomes
//! one of its inputs. After each run, inputs that were not read again are
//! dropped, so conditional branches subscribe only to what they touch.

mod atom;
mod calc;
mod context;
mod effect;
mod readable;
mod runtime;

pub use atom::Atom;
pub use calc::Calc;
pub use context::untrack;
pub use effect::Effect;
pub use readable::Readable;
pub use runtime::Runtime;
