//! Encryption facade.
//!
//! [`Engine`] is the single entry point for callers. It routes each value to
//! the provider bound to its classification and produces self-contained text
//! ciphertexts (base64 of header and AEAD output) suitable for storing in a
//! string column.

use crate::classification::Classification;
use crate::config::{EngineConfig, UnknownLabelPolicy};
use crate::error::Error;
use crate::key_source::RootKeySource;
use crate::policy::{AccessPolicy, PermitAll};
use crate::registry::Registry;
use crate::state::{SecurityController, SecurityState};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Classified field encryption engine.
///
/// Cloning is cheap; clones share the registry and policy.
///
/// # Example
///
/// ```
/// use classcrypt::prelude::*;
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let source = Arc::new(StaticRootKey::new(vec![42u8; 32]));
/// let (engine, controller) = Engine::bootstrap(source, &EngineConfig::default())?;
///
/// let stored = engine.encrypt("alice@example.com", Classification::Personal)?;
/// let plain = engine.decrypt(&stored, Classification::Personal, controller.state())?;
/// assert_eq!(plain, "alice@example.com");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Engine {
    registry: Arc<Registry>,
    policy: Arc<dyn AccessPolicy>,
    unknown_labels: UnknownLabelPolicy,
}

impl Engine {
    /// Creates an engine over `registry` that permits every decryption and
    /// maps unknown labels to the baseline classification.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            policy: Arc::new(PermitAll),
            unknown_labels: UnknownLabelPolicy::Baseline,
        }
    }

    /// Creates an engine configured by `config`.
    #[must_use]
    pub fn from_config(registry: Arc<Registry>, config: &EngineConfig) -> Self {
        let engine = Self::new(registry).with_unknown_labels(config.unknown_labels);
        let guard = config.guard.to_policy();
        if guard.is_empty() {
            engine
        } else {
            engine.with_policy(guard)
        }
    }

    /// Fetches the root key, builds the registry, and returns an engine with
    /// its state controller.
    ///
    /// # Errors
    ///
    /// - `Error::KeyRetrieval` if the root key cannot be fetched
    /// - `Error::RegistryInit` if any classification fails to derive
    pub fn bootstrap(
        source: Arc<dyn RootKeySource>,
        config: &EngineConfig,
    ) -> Result<(Self, SecurityController), Error> {
        let root_key = source.fetch_root_key()?;
        let registry = Arc::new(Registry::initialize(&root_key)?);
        drop(root_key);

        let controller = SecurityController::new(Arc::clone(&registry), source)
            .with_history_capacity(config.history_capacity);
        Ok((Self::from_config(registry, config), controller))
    }

    /// Replaces the decryption access policy.
    #[must_use]
    pub fn with_policy(mut self, policy: impl AccessPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Sets the treatment of unrecognized labels.
    #[must_use]
    pub fn with_unknown_labels(mut self, policy: UnknownLabelPolicy) -> Self {
        self.unknown_labels = policy;
        self
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Resolves a free-form label according to the unknown-label policy.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownClassification` under [`UnknownLabelPolicy::Reject`].
    pub fn resolve_label(&self, label: &str) -> Result<Classification, Error> {
        match label.parse::<Classification>() {
            Ok(classification) => Ok(classification),
            Err(err) => match self.unknown_labels {
                UnknownLabelPolicy::Baseline => {
                    debug!(
                        label,
                        fallback = %Classification::BASELINE,
                        "unknown label, using baseline"
                    );
                    Ok(Classification::BASELINE)
                }
                UnknownLabelPolicy::Reject => Err(err),
            },
        }
    }

    /// Encrypts `plaintext` under `classification`.
    ///
    /// Empty input is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `Error::Encryption` if the AEAD operation fails.
    pub fn encrypt(
        &self,
        plaintext: &str,
        classification: Classification,
    ) -> Result<String, Error> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let sealed = self.registry.lookup(classification).seal(plaintext.as_bytes())?;
        Ok(STANDARD.encode(sealed))
    }

    /// Encrypts an optional value; `None` stays `None`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Encryption` if the AEAD operation fails.
    pub fn encrypt_opt(
        &self,
        plaintext: Option<&str>,
        classification: Classification,
    ) -> Result<Option<String>, Error> {
        plaintext.map(|p| self.encrypt(p, classification)).transpose()
    }

    /// Encrypts under the classification named by a free-form label.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownClassification` if the label is unknown and the
    ///   engine rejects unknown labels
    /// - `Error::Encryption` if the AEAD operation fails
    pub fn encrypt_labeled(&self, plaintext: &str, label: &str) -> Result<String, Error> {
        let classification = self.resolve_label(label)?;
        self.encrypt(plaintext, classification)
    }

    /// Decrypts a value produced by [`Engine::encrypt`].
    ///
    /// `state` is the caller's current security state, as reported by the
    /// [`SecurityController`]; the access policy is evaluated against it.
    /// Empty input is returned unchanged.
    ///
    /// # Errors
    ///
    /// - `Error::AccessDenied` if the policy refuses `classification` in `state`
    /// - `Error::Decryption` for malformed, tampered, foreign or stale ciphertext
    pub fn decrypt(
        &self,
        ciphertext: &str,
        classification: Classification,
        state: SecurityState,
    ) -> Result<String, Error> {
        if ciphertext.is_empty() {
            return Ok(String::new());
        }

        if !self.policy.permits(classification, state) {
            warn!(%classification, %state, "decryption denied by access policy");
            return Err(Error::AccessDenied {
                classification,
                state,
            });
        }

        let sealed = STANDARD.decode(ciphertext).map_err(|_| Error::Decryption)?;
        let plaintext = Zeroizing::new(self.registry.lookup(classification).open(&sealed)?);

        String::from_utf8(plaintext.to_vec()).map_err(|_| Error::Decryption)
    }

    /// Decrypts an optional value; `None` stays `None`.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::decrypt`].
    pub fn decrypt_opt(
        &self,
        ciphertext: Option<&str>,
        classification: Classification,
        state: SecurityState,
    ) -> Result<Option<String>, Error> {
        ciphertext.map(|c| self.decrypt(c, classification, state)).transpose()
    }

    /// Decrypts under the classification named by a free-form label.
    ///
    /// # Errors
    ///
    /// - `Error::Decryption` if the label is unknown and the engine rejects
    ///   unknown labels, or if decryption fails
    /// - `Error::AccessDenied` if the policy refuses the resolved classification
    pub fn decrypt_labeled(
        &self,
        ciphertext: &str,
        label: &str,
        state: SecurityState,
    ) -> Result<String, Error> {
        let classification = self.resolve_label(label).map_err(|_| Error::Decryption)?;
        self.decrypt(ciphertext, classification, state)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("epoch", &self.registry.epoch())
            .field("unknown_labels", &self.unknown_labels)
            .finish_non_exhaustive()
    }
}
