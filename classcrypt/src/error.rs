//! Error types for `classcrypt` operations.

use crate::classification::Classification;
use crate::state::SecurityState;
use std::fmt;

/// Main error type for `classcrypt` operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Key derivation failed (empty root key, empty label, short digest)
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// The registry could not derive a binding for every classification
    #[error("registry initialization failed: {0}")]
    RegistryInit(String),

    /// Label does not name one of the fixed classifications
    #[error("unknown classification: {0}")]
    UnknownClassification(String),

    /// Encryption operation failed
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed.
    ///
    /// Deliberately carries no detail: malformed input, a tampered tag and a
    /// wrong key are indistinguishable to the caller.
    #[error("decryption failed")]
    Decryption,

    /// Encryption header parsing failed
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Key rotation failed; the previous binding table is still active
    #[error("key rotation failed: {0}")]
    RotationFailed(String),

    /// Another rotation is already running
    #[error("key rotation already in progress")]
    RotationInProgress,

    /// The security state machine does not allow this transition
    #[error("invalid security state transition: {from} -> {to}")]
    InvalidStateTransition {
        /// State the controller was in
        from: SecurityState,
        /// Requested target state
        to: SecurityState,
    },

    /// Access policy refused decryption in the current state
    #[error("decryption of {classification} data denied in {state} state")]
    AccessDenied {
        /// Classification of the refused field
        classification: Classification,
        /// State the caller supplied
        state: SecurityState,
    },

    /// Root key could not be fetched from the custodian
    #[error("key retrieval error: {0}")]
    KeyRetrieval(#[from] KeyRetrievalError),
}

/// Errors raised by a [`RootKeySource`](crate::key_source::RootKeySource).
#[derive(Debug)]
pub enum KeyRetrievalError {
    /// Root key (or the requested version of it) does not exist
    NotFound(String),

    /// Custodian could not be reached or refused the request
    Unavailable(String),

    /// Custodian returned unusable key bytes
    InvalidKey(String),

    /// I/O operation failed
    Io(std::io::Error),
}

impl fmt::Display for KeyRetrievalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "root key not found: {id}"),
            Self::Unavailable(msg) => write!(f, "key custodian unavailable: {msg}"),
            Self::InvalidKey(msg) => write!(f, "invalid root key: {msg}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for KeyRetrievalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for KeyRetrievalError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
