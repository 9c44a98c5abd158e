//! Per-classification key derivation.
//!
//! Every classification gets its own key pair, derived from the root key with
//! HMAC-SHA256 keyed by the root key over the classification's canonical name:
//!
//! ```text
//! digest             = HMAC-SHA256(root_key, name)
//! encryption_key     = digest[0..16]
//! authentication_key = digest[16..32]
//! ```

use crate::classification::Classification;
use crate::error::Error;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret, SecretVec};
use sha2::Sha256;
use std::fmt;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Size of each half of the key pair in bytes (128 bits).
pub const KEY_SIZE: usize = 16;

/// Size of a key fingerprint in bytes.
pub const FINGERPRINT_SIZE: usize = 8;

const FINGERPRINT_LABEL: &[u8] = b"classcrypt/fingerprint";

/// Derived (encryption key, authentication key) pair for one classification.
///
/// Key bytes are zeroized on drop and never printed.
pub struct KeyMaterial {
    encryption_key: Secret<[u8; KEY_SIZE]>,
    authentication_key: Secret<[u8; KEY_SIZE]>,
}

impl KeyMaterial {
    /// Returns the encryption key.
    #[must_use]
    pub fn encryption_key(&self) -> &[u8; KEY_SIZE] {
        self.encryption_key.expose_secret()
    }

    /// Returns the authentication key.
    #[must_use]
    pub fn authentication_key(&self) -> &[u8; KEY_SIZE] {
        self.authentication_key.expose_secret()
    }

    /// Computes the public fingerprint of this key pair for `name`.
    ///
    /// `HMAC-SHA256(authentication_key, "classcrypt/fingerprint" || name)[..8]`
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyDerivation` if the HMAC cannot be keyed.
    pub fn fingerprint(&self, name: &str) -> Result<KeyFingerprint, Error> {
        let mut mac = HmacSha256::new_from_slice(self.authentication_key())
            .map_err(|e| Error::KeyDerivation(format!("invalid authentication key: {e}")))?;
        mac.update(FINGERPRINT_LABEL);
        mac.update(name.as_bytes());
        let tag = mac.finalize().into_bytes();

        let mut bytes = [0u8; FINGERPRINT_SIZE];
        bytes.copy_from_slice(&tag[..FINGERPRINT_SIZE]);
        Ok(KeyFingerprint(bytes))
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial").finish_non_exhaustive()
    }
}

/// Short identifier of one key generation, safe to store and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyFingerprint([u8; FINGERPRINT_SIZE]);

impl KeyFingerprint {
    /// Wraps raw fingerprint bytes (as read from a ciphertext header).
    #[must_use]
    pub const fn from_bytes(bytes: [u8; FINGERPRINT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; FINGERPRINT_SIZE] {
        &self.0
    }
}

impl fmt::Display for KeyFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Derives the key pair for a classification name from the root key.
///
/// # Errors
///
/// Returns `Error::KeyDerivation` if the root key or the name is empty.
///
/// # Example
///
/// ```
/// use classcrypt::kdf::derive_key_material;
/// use secrecy::SecretVec;
///
/// let root = SecretVec::new(vec![7u8; 32]);
/// let keys = derive_key_material(&root, "personal").expect("derivation failed");
/// assert_ne!(keys.encryption_key(), keys.authentication_key());
/// ```
pub fn derive_key_material(root_key: &SecretVec<u8>, name: &str) -> Result<KeyMaterial, Error> {
    let root = root_key.expose_secret();
    if root.is_empty() {
        return Err(Error::KeyDerivation("root key is empty".to_string()));
    }
    if name.is_empty() {
        return Err(Error::KeyDerivation("classification name is empty".to_string()));
    }

    let mut mac = HmacSha256::new_from_slice(root)
        .map_err(|e| Error::KeyDerivation(format!("invalid root key: {e}")))?;
    mac.update(name.as_bytes());
    let digest = Zeroizing::new(mac.finalize().into_bytes().to_vec());

    if digest.len() < 2 * KEY_SIZE {
        return Err(Error::KeyDerivation(format!(
            "digest too short: {} bytes (need {})",
            digest.len(),
            2 * KEY_SIZE
        )));
    }

    let mut encryption_key = [0u8; KEY_SIZE];
    let mut authentication_key = [0u8; KEY_SIZE];
    encryption_key.copy_from_slice(&digest[..KEY_SIZE]);
    authentication_key.copy_from_slice(&digest[KEY_SIZE..2 * KEY_SIZE]);

    Ok(KeyMaterial {
        encryption_key: Secret::new(encryption_key),
        authentication_key: Secret::new(authentication_key),
    })
}

/// Derives the key pair for a classification.
///
/// # Errors
///
/// Returns `Error::KeyDerivation` if the root key is empty.
pub fn derive_for(
    root_key: &SecretVec<u8>,
    classification: Classification,
) -> Result<KeyMaterial, Error> {
    derive_key_material(root_key, classification.as_str())
}
