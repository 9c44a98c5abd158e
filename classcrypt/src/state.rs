//! Security state machine.
//!
//! ```text
//! Normal <-> Heightened
//! Normal <-> Rotating        entering Rotating re-derives every key
//! Normal <-> Escalating
//! Normal | Heightened -> Recovering -> Normal
//! ```
//!
//! `Normal` is the hub: every excursion returns to it, and `Recovering` is
//! additionally reachable from `Heightened`. There is no terminal state.

use crate::error::Error;
use crate::key_source::RootKeySource;
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock, TryLockError};
use std::time::{Duration, Instant, SystemTime};
use tracing::{info, warn};

/// Default number of transitions kept in the controller's history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 64;

/// Operational security posture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityState {
    /// Normal operations.
    Normal,
    /// Elevated alert; callers may demand extra authorization before decrypting.
    Heightened,
    /// Key rotation has been performed and not yet acknowledged.
    Rotating,
    /// Key material restore may be required from the custodian.
    Recovering,
    /// Progressive escalation of protections.
    Escalating,
}

impl SecurityState {
    /// Every state.
    pub const ALL: [Self; 5] =
        [Self::Normal, Self::Heightened, Self::Rotating, Self::Recovering, Self::Escalating];

    /// Canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Heightened => "heightened",
            Self::Rotating => "rotating",
            Self::Recovering => "recovering",
            Self::Escalating => "escalating",
        }
    }

    /// Returns `true` if the machine allows moving from `self` to `to`.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Normal, Self::Heightened | Self::Rotating | Self::Recovering | Self::Escalating)
                | (Self::Heightened, Self::Normal | Self::Recovering)
                | (Self::Rotating | Self::Recovering | Self::Escalating, Self::Normal)
        )
    }
}

impl fmt::Display for SecurityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SecurityState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown security state: {s}"))
    }
}

/// Recorded intent to restore key material, set on entering `Recovering`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryIntent {
    /// When recovery was requested.
    pub requested_at: SystemTime,
    /// Rotation epoch in force when recovery was requested.
    pub epoch: u64,
}

/// One entry in the controller's transition history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRecord {
    /// State left.
    pub from: SecurityState,
    /// State entered.
    pub to: SecurityState,
    /// When the transition completed.
    pub at: SystemTime,
    /// Time spent in `from`.
    pub dwell: Duration,
    /// Rotation epoch after the transition.
    pub epoch: u64,
}

#[derive(Debug, Clone, Copy)]
struct Current {
    state: SecurityState,
    entered_at: Instant,
    recovery: Option<RecoveryIntent>,
}

/// Owns the process-wide security state and drives key rotation.
///
/// The current state is read through [`SecurityController::state`] and passed
/// explicitly to operations that depend on it; nothing reads it ambiently.
pub struct SecurityController {
    registry: Arc<Registry>,
    source: Arc<dyn RootKeySource>,
    current: RwLock<Current>,
    transitions: Mutex<()>,
    history: Mutex<VecDeque<TransitionRecord>>,
    history_capacity: usize,
}

impl SecurityController {
    /// Creates a controller in the `Normal` state.
    pub fn new(registry: Arc<Registry>, source: Arc<dyn RootKeySource>) -> Self {
        Self {
            registry,
            source,
            current: RwLock::new(Current {
                state: SecurityState::Normal,
                entered_at: Instant::now(),
                recovery: None,
            }),
            transitions: Mutex::new(()),
            history: Mutex::new(VecDeque::new()),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }

    /// Sets how many transitions the history keeps.
    #[must_use]
    pub const fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> SecurityState {
        self.read_current().state
    }

    /// Returns how long the controller has been in the current state.
    #[must_use]
    pub fn time_in_state(&self) -> Duration {
        self.read_current().entered_at.elapsed()
    }

    /// Returns the pending recovery intent, if the controller is recovering.
    #[must_use]
    pub fn recovery_intent(&self) -> Option<RecoveryIntent> {
        self.read_current().recovery
    }

    /// Returns the registry this controller rotates.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Returns recorded transitions, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<TransitionRecord> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).iter().copied().collect()
    }

    /// Moves the controller to `target`.
    ///
    /// Entering `Rotating` fetches the root key and rotates every
    /// classification before the new state is published; if that fails the
    /// controller stays where it was.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidStateTransition` if the machine does not allow the move
    /// - `Error::RotationFailed` if root key retrieval or derivation fails
    /// - `Error::RotationInProgress` if a rotation is already running; any
    ///   transition requested while one is running fails this way at once
    pub fn transition(&self, target: SecurityState) -> Result<SecurityState, Error> {
        // claimed before waiting on the serial lock so a rotation holding it is visible
        let claim = match target {
            SecurityState::Rotating => Some(self.registry.begin_rotation()?),
            _ => None,
        };

        let _serial = match self.transitions.try_lock() {
            Ok(serial) => serial,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                if claim.is_none() && self.registry.is_rotating() {
                    warn!(to = %target, "security state transition rejected: rotation running");
                    return Err(Error::RotationInProgress);
                }
                self.transitions.lock().unwrap_or_else(PoisonError::into_inner)
            }
        };

        let from = self.read_current();
        if !from.state.can_transition_to(target) {
            warn!(from = %from.state, to = %target, "security state transition rejected");
            return Err(Error::InvalidStateTransition {
                from: from.state,
                to: target,
            });
        }

        let epoch = match &claim {
            Some(claim) => self.registry.rotate_claimed(claim, || self.source.fetch_root_key())?,
            None => self.registry.epoch(),
        };

        let recovery = (target == SecurityState::Recovering).then(|| RecoveryIntent {
            requested_at: SystemTime::now(),
            epoch,
        });

        let now = Instant::now();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Current {
            state: target,
            entered_at: now,
            recovery,
        };

        let record = TransitionRecord {
            from: from.state,
            to: target,
            at: SystemTime::now(),
            dwell: now.saturating_duration_since(from.entered_at),
            epoch,
        };
        self.record(record);

        if target == SecurityState::Recovering {
            info!(from = %from.state, epoch, "key material recovery requested");
        } else {
            info!(from = %from.state, to = %target, epoch, "security state changed");
        }

        Ok(target)
    }

    fn read_current(&self) -> Current {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, record: TransitionRecord) {
        if self.history_capacity == 0 {
            return;
        }
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        while history.len() >= self.history_capacity {
            history.pop_front();
        }
        history.push_back(record);
    }
}

impl fmt::Debug for SecurityController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityController")
            .field("state", &self.state())
            .field("epoch", &self.registry.epoch())
            .finish_non_exhaustive()
    }
}
