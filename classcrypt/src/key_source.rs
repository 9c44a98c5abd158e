//! Root key custodian abstraction.

use crate::error::KeyRetrievalError;
use secrecy::{ExposeSecret, SecretVec};

/// Supplies the root key from which every classification key is derived.
///
/// The engine fetches the root key once at startup and again for each
/// rotation; it never caches it. Implementations must be thread-safe
/// (`Send + Sync`) because rotations may be requested from any thread.
///
/// # Example
///
/// ```rust,ignore
/// use classcrypt::key_source::RootKeySource;
///
/// struct VaultClient;
///
/// impl RootKeySource for VaultClient {
///     fn fetch_root_key(&self) -> Result<SecretVec<u8>, KeyRetrievalError> {
///         // Call the managed key vault
///     }
/// }
/// ```
pub trait RootKeySource: Send + Sync {
    /// Fetches the current root key.
    ///
    /// # Errors
    ///
    /// Returns `KeyRetrievalError` if the custodian cannot produce the key.
    fn fetch_root_key(&self) -> Result<SecretVec<u8>, KeyRetrievalError>;
}

/// In-memory root key, for tests and embedded use.
pub struct StaticRootKey {
    key: SecretVec<u8>,
}

impl StaticRootKey {
    /// Wraps the given key bytes.
    #[must_use]
    pub fn new(key: Vec<u8>) -> Self {
        Self {
            key: SecretVec::new(key),
        }
    }
}

impl RootKeySource for StaticRootKey {
    fn fetch_root_key(&self) -> Result<SecretVec<u8>, KeyRetrievalError> {
        let key = self.key.expose_secret();
        if key.is_empty() {
            return Err(KeyRetrievalError::InvalidKey("root key is empty".to_string()));
        }
        Ok(SecretVec::new(key.clone()))
    }
}

impl<S: RootKeySource + ?Sized> RootKeySource for std::sync::Arc<S> {
    fn fetch_root_key(&self) -> Result<SecretVec<u8>, KeyRetrievalError> {
        (**self).fetch_root_key()
    }
}
