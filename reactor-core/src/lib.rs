//! Reactor Core
//!
//! This crate provides a fine-grained reactive dependency-tracking engine.
//! Mutable sources and derived values stay consistent without manual
//! wiring, and side effects run exactly when an observable result changes.
//! It implements:
//!
//! - Reactive primitives (atoms, calcs, effects)
//! - Automatic, dynamic dependency tracking
//! - Glitch-free two-phase (stale/fresh) propagation
//! - Cycle detection and explicit disposal
//!
//! All propagation is synchronous: a write settles the whole affected
//! subgraph before it returns.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: Node arena, edge sets and per-node propagation counters
//! - `reactive`: Runtime, tracking context and the public primitives
//! - `config`: Per-thread runtime configuration
//! - `error`: Error type shared by reads, writes and computations
//!
//! # Example
//!
//! ```rust,ignore
//! use reactor_core::{Atom, Calc, Effect};
//!
//! // Create an atom
//! let count = Atom::new(1);
//!
//! // Create a derived value
//! let doubled = count.map(|n| n * 2)?;
//!
//! // Create an effect
//! let _log = Effect::new({
//!     let count = count.clone();
//!     let doubled = doubled.clone();
//!     move || {
//!         println!("Count: {}, Doubled: {}", count.get()?, doubled.get()?);
//!         Ok(())
//!     }
//! })?;
//!
//! // Update the atom
//! count.set(5)?;
//! // Effect runs before `set` returns, prints: "Count: 5, Doubled: 10"
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;

pub use config::{RecoveryMode, RuntimeConfig};
pub use error::{Error, Result};
pub use graph::{GraphSnapshot, NodeId, NodeKind, NodeSnapshot, NodeState};
pub use reactive::{untrack, Atom, Calc, Effect, Readable, Runtime};
