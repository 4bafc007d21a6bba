//! Fault injection for audit sessions
//!
//! Faults are declared as [`FaultSpec`] values and folded into a
//! [`SessionConfig`] by [`FaultInjector::prepare`]. The session backend
//! applies the resulting configuration when the session is created, before
//! the first navigation, and never removes it: a fault is never healed
//! mid-check.
//!
//! The browser-specific halves live in the submodules:
//! - [`storage`]: corrupt a persisted-storage key before page scripts run
//! - [`network`]: abort requests matching a URL pattern
//! - [`motion`]: emulate `prefers-reduced-motion: reduce`

pub mod motion;
pub mod network;
pub mod storage;

pub use motion::MotionPreference;
pub use network::{NetworkRule, RuleAction, RuleMatcher};
pub use storage::StorageFault;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::session::SessionConfig;

/// A single environmental fault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FaultSpec {
    /// Write a (typically malformed) payload under a storage key before load
    CorruptStorage { key: String, payload: String },
    /// Abort every request whose URL matches the pattern
    BlockNetwork { pattern: String },
    /// Report `prefers-reduced-motion: reduce`
    ReducedMotion,
}

impl FaultSpec {
    pub fn describe(&self) -> String {
        match self {
            FaultSpec::CorruptStorage { key, .. } => format!("corrupt storage key {}", key),
            FaultSpec::BlockNetwork { pattern } => format!("block {}", pattern),
            FaultSpec::ReducedMotion => "reduced motion".to_string(),
        }
    }
}

/// Turns fault specs into session configuration
pub struct FaultInjector;

impl FaultInjector {
    /// Fold `faults` into `base`.
    ///
    /// Blocking rules are placed ahead of the base rules so they take
    /// precedence under first-match semantics. Specs are applied in order.
    pub fn prepare(mut base: SessionConfig, faults: &[FaultSpec]) -> SessionConfig {
        let mut blocking = Vec::new();

        for fault in faults {
            debug!("Preparing fault: {}", fault.describe());
            match fault {
                FaultSpec::CorruptStorage { key, payload } => {
                    base.storage_faults.push(StorageFault::new(key.clone(), payload.clone()));
                }
                FaultSpec::BlockNetwork { pattern } => {
                    blocking.push(NetworkRule::abort(pattern.clone()));
                }
                FaultSpec::ReducedMotion => {
                    base.motion = MotionPreference::Reduced;
                }
            }
        }

        blocking.append(&mut base.network_rules);
        base.network_rules = blocking;
        base
    }
}
