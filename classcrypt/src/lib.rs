//! # `classcrypt`
//!
//! Classification-driven field encryption. Each sensitivity classification is
//! protected by its own key pair, derived from a single root key, and served
//! by its own AEAD provider. A small state machine governs rotation and
//! decryption guards.
//!
//! ## Features
//!
//! - Per-classification keys via HMAC-SHA256 from one root key
//! - AES-128-GCM with the ciphertext header bound as associated data
//! - Whole-table key rotation, atomic for concurrent readers
//! - Security state machine driving rotation and recovery intent
//! - Pluggable root key custodians and decryption access policies
//! - Static field mapping (`FieldMap`, `#[derive(Classified)]`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use classcrypt::prelude::*;
//!
//! let source = Arc::new(FileRootKeySource::new("./keys")?);
//! let (engine, controller) = Engine::bootstrap(source, &EngineConfig::default())?;
//!
//! let stored = engine.encrypt("alice@example.com", Classification::Personal)?;
//! let plain = engine.decrypt(&stored, Classification::Personal, controller.state())?;
//!
//! controller.transition(SecurityState::Rotating)?;
//! controller.transition(SecurityState::Normal)?;
//! ```

#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod classification;
pub mod config;
pub mod engine;
pub mod error;
pub mod header;
pub mod kdf;
pub mod key_source;
pub mod policy;
pub mod provider;
pub mod record;
pub mod registry;
pub mod state;

pub use classification::Classification;
pub use engine::Engine;
pub use error::Error;

pub mod prelude {
    //! Convenience re-exports for common use.
    pub use crate::classification::Classification;
    pub use crate::config::{EngineConfig, GuardConfig, UnknownLabelPolicy};
    pub use crate::engine::Engine;
    pub use crate::error::{Error, KeyRetrievalError};
    pub use crate::key_source::{RootKeySource, StaticRootKey};
    pub use crate::policy::{AccessPolicy, PermitAll, StateGuard};
    pub use crate::record::{ClassifiedRecord, FieldMap, FieldSpec, FieldValue};
    pub use crate::registry::Registry;
    pub use crate::state::{SecurityController, SecurityState};
}
