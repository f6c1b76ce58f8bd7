//! Error types for the reactive engine.

use thiserror::Error;

use crate::graph::NodeId;

/// Errors raised by reads, writes and computations.
#[derive(Error, Debug)]
pub enum Error {
    /// A computation read itself, or read a node whose stale resolution is
    /// still in progress.
    #[error("cycle detected in {label}")]
    CycleDetected {
        /// Label of the computation that performed the read.
        label: String,
        /// The computation that performed the read.
        node: NodeId,
    },

    /// The handle refers to a node that has been disposed.
    #[error("node {0} has been disposed")]
    Disposed(NodeId),

    /// A user computation failed. The inner error is passed through as-is.
    #[error("{0}")]
    Computation(Box<dyn std::error::Error + 'static>),

    /// Configuration could not be parsed.
    #[error("invalid runtime config: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// Wrap an arbitrary error raised inside a computation.
    pub fn computation<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + 'static>>,
    {
        Error::Computation(err.into())
    }

    /// Raise a computation error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Error::Computation(message.into())
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self, Error::CycleDetected { .. })
    }

    /// Borrow the wrapped computation error, if this is one.
    pub fn as_computation(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Computation(inner) => Some(inner.as_ref()),
            _ => None,
        }
    }
}

/// Result type for reactive operations.
pub type Result<T> = std::result::Result<T, Error>;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Overflow;

    impl fmt::Display for Overflow {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("overflow")
        }
    }

    impl std::error::Error for Overflow {}

    #[test]
    fn cycle_message_names_label() {
        let err = Error::CycleDetected {
            label: "total".into(),
            node: NodeId::new(3, 0),
        };
        assert_eq!(err.to_string(), "cycle detected in total");
        assert!(err.is_cycle());
    }

    #[test]
    fn computation_error_keeps_inner_type() {
        let err = Error::computation(Overflow);
        assert_eq!(err.to_string(), "overflow");
        assert!(err
            .as_computation()
            .and_then(|inner| inner.downcast_ref::<Overflow>())
            .is_some());
    }

    #[test]
    fn msg_builds_computation_error() {
        let err = Error::msg("bad cell");
        assert!(!err.is_cycle());
        assert_eq!(err.to_string(), "bad cell");
    }
}
