//! Sensitivity classifications.
//!
//! The set is closed: every classification is known at compile time and each
//! one is bound to its own independently derived key. Classifications are
//! categories, not a hierarchy, so no ordering is defined between them.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Data sensitivity classification governing which key protects a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Lowest-sensitivity tier; fallback for unrecognized labels.
    Baseline,
    /// Internal operational data.
    Internal,
    /// Personally identifying data.
    Personal,
    /// Payment and account data.
    Financial,
    /// Medical data.
    Health,
    /// Secrets, tokens and recovery codes.
    Credential,
    /// Business-critical data.
    Critical,
    /// Audit trail entries.
    Audit,
}

impl Classification {
    /// Number of classifications.
    pub const COUNT: usize = 8;

    /// Every classification, in wire-id order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Baseline,
        Self::Internal,
        Self::Personal,
        Self::Financial,
        Self::Health,
        Self::Credential,
        Self::Critical,
        Self::Audit,
    ];

    /// Classification used when a free-form label matches nothing.
    pub const BASELINE: Self = Self::Baseline;

    /// Canonical name. This is the key-derivation message, so it must never change.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Internal => "internal",
            Self::Personal => "personal",
            Self::Financial => "financial",
            Self::Health => "health",
            Self::Credential => "credential",
            Self::Critical => "critical",
            Self::Audit => "audit",
        }
    }

    /// Position in [`Classification::ALL`], also the one-byte wire id.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Wire id stored in the ciphertext header.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Looks up a classification by its wire id.
    #[must_use]
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(usize::from(id)).copied()
    }

    /// Resolves a free-form label, falling back to [`Classification::BASELINE`].
    ///
    /// The fallback silently lowers protection for mistyped labels; callers
    /// that want a hard failure use [`str::parse`] instead.
    #[must_use]
    pub fn resolve(label: &str) -> Self {
        label.parse().unwrap_or(Self::BASELINE)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Classification {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(label))
            .ok_or_else(|| Error::UnknownClassification(label.to_string()))
    }
}
