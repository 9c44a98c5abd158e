//! Decryption access policy.
//!
//! The engine asks its policy before every decryption, passing the security
//! state the caller supplied. The core ships two policies: one that permits
//! everything and one that blocks chosen classifications while the system is
//! in chosen states. Anything richer (step-up authorization, per-user scopes)
//! belongs to the caller.

use crate::classification::Classification;
use crate::state::SecurityState;
use std::collections::HashSet;

/// Decides whether a classification may be decrypted in a given state.
pub trait AccessPolicy: Send + Sync {
    /// Returns `true` if decryption is permitted.
    fn permits(&self, classification: Classification, state: SecurityState) -> bool;
}

/// Permits every decryption.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermitAll;

impl AccessPolicy for PermitAll {
    fn permits(&self, _classification: Classification, _state: SecurityState) -> bool {
        true
    }
}

/// Denies decryption of guarded classifications while in guarded states.
#[derive(Debug, Clone, Default)]
pub struct StateGuard {
    classifications: HashSet<Classification>,
    states: HashSet<SecurityState>,
}

impl StateGuard {
    /// Creates a guard over the given classifications and states.
    #[must_use]
    pub fn new(
        classifications: impl IntoIterator<Item = Classification>,
        states: impl IntoIterator<Item = SecurityState>,
    ) -> Self {
        Self {
            classifications: classifications.into_iter().collect(),
            states: states.into_iter().collect(),
        }
    }

    /// Returns `true` if the guard blocks nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classifications.is_empty() || self.states.is_empty()
    }
}

impl AccessPolicy for StateGuard {
    fn permits(&self, classification: Classification, state: SecurityState) -> bool {
        !(self.classifications.contains(&classification) && self.states.contains(&state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permit_all() {
        for class in Classification::ALL {
            for state in SecurityState::ALL {
                assert!(PermitAll.permits(class, state));
            }
        }
    }

    #[test]
    fn test_state_guard_blocks_only_guarded_pairs() {
        let guard = StateGuard::new(
            [Classification::Credential, Classification::Critical],
            [SecurityState::Heightened, SecurityState::Escalating],
        );

        assert!(!guard.permits(Classification::Credential, SecurityState::Heightened));
        assert!(!guard.permits(Classification::Critical, SecurityState::Escalating));
        assert!(guard.permits(Classification::Credential, SecurityState::Normal));
        assert!(guard.permits(Classification::Personal, SecurityState::Heightened));
    }

    #[test]
    fn test_default_guard_is_empty() {
        let guard = StateGuard::default();
        assert!(guard.is_empty());
        assert!(guard.permits(Classification::Critical, SecurityState::Escalating));
    }
}
