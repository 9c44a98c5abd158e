//! Engine configuration.
//!
//! Every field has a default, so an empty document is a valid configuration:
//!
//! ```json
//! {
//!   "unknown_labels": "baseline",
//!   "history_capacity": 64,
//!   "guard": { "classifications": ["credential"], "states": ["heightened", "escalating"] }
//! }
//! ```

use crate::classification::Classification;
use crate::policy::StateGuard;
use crate::state::{SecurityState, DEFAULT_HISTORY_CAPACITY};
use serde::{Deserialize, Serialize};

/// How the engine treats free-form labels that name no classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownLabelPolicy {
    /// Encrypt and decrypt under [`Classification::BASELINE`].
    #[default]
    Baseline,
    /// Refuse the operation.
    Reject,
}

/// Classifications whose decryption is refused while in the listed states.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Guarded classifications.
    pub classifications: Vec<Classification>,
    /// States in which the guard applies.
    pub states: Vec<SecurityState>,
}

impl GuardConfig {
    /// Builds the access policy described by this section.
    #[must_use]
    pub fn to_policy(&self) -> StateGuard {
        StateGuard::new(
            self.classifications.iter().copied(),
            self.states.iter().copied(),
        )
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Treatment of unrecognized labels.
    pub unknown_labels: UnknownLabelPolicy,
    /// Number of state transitions the controller remembers.
    pub history_capacity: usize,
    /// Decryption guard.
    pub guard: GuardConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unknown_labels: UnknownLabelPolicy::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            guard: GuardConfig::default(),
        }
    }
}
