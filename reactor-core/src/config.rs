//! Runtime Configuration
//!
//! Every thread owns one runtime, and every runtime carries a
//! [`RuntimeConfig`]. The defaults are what most consumers want; the knobs
//! exist for diagnostics and for reproducing the minimal recovery behavior.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What to clean up when a propagation pass ends with nodes still pending.
///
/// A failing computation never leaves state behind: the pass resolves every
/// other node before returning the error. Pending counters are left by a
/// computation that panicked or by a node disposed in the middle of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryMode {
    /// Reset the counters and flags of every node the pass touched that is
    /// not clean when the outermost write finishes.
    #[default]
    Subgraph,

    /// Reset only the node where a cycle was detected. Other nodes may keep
    /// pending stale counts until they are disposed.
    Local,
}

/// Per-thread engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Cleanup policy for nodes left pending by a pass.
    pub recovery: RecoveryMode,

    /// Name used in cycle errors for computations without a label.
    pub unlabeled: String,

    /// Emit per-node TRACE events during propagation.
    pub trace_propagation: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            recovery: RecoveryMode::default(),
            unlabeled: "?".to_owned(),
            trace_propagation: false,
        }
    }
}

impl RuntimeConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_recovery(mut self, recovery: RecoveryMode) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn with_unlabeled(mut self, unlabeled: impl Into<String>) -> Self {
        self.unlabeled = unlabeled.into();
        self
    }

    pub fn with_trace_propagation(mut self, enabled: bool) -> Self {
        self.trace_propagation = enabled;
        self
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.recovery, RecoveryMode::Subgraph);
        assert_eq!(config.unlabeled, "?");
        assert!(!config.trace_propagation);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = RuntimeConfig::from_json(r#"{ "recovery": "local" }"#).unwrap();
        assert_eq!(config.recovery, RecoveryMode::Local);
        assert_eq!(config.unlabeled, "?");
    }

    #[test]
    fn invalid_json_is_a_config_error() {
        let err = RuntimeConfig::from_json(r#"{ "recovery": "rollback" }"#).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn builders_chain() {
        let config = RuntimeConfig::default()
            .with_recovery(RecoveryMode::Local)
            .with_unlabeled("<anon>")
            .with_trace_propagation(true);
        assert_eq!(config.unlabeled, "<anon>");
        assert!(config.trace_propagation);

        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(RuntimeConfig::from_json(&json).unwrap(), config);
    }
}
