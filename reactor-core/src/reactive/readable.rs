//! The capability shared by everything that can be read reactively.

use crate::error::Result;
use crate::graph::NodeId;

/// A value that can be read with or without subscribing.
///
/// Implemented by [`Atom`](super::Atom) and [`Calc`](super::Calc), so
/// consumers can accept either one without caring where the value comes
/// from.
pub trait Readable<T> {
    /// The graph node behind this value.
    fn id(&self) -> NodeId;

    /// Read the value, registering a dependency when called from inside a
    /// running computation.
    fn get(&self) -> Result<T>;

    /// Read the value without registering a dependency.
    fn peek(&self) -> T;
}
