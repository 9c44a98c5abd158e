//! Per-classification AEAD provider.
//!
//! Each classification owns one provider built from its derived key pair:
//! the encryption key drives AES-128-GCM, the authentication key yields the
//! fingerprint stamped into every header. The header is bound as associated
//! data.

use crate::classification::Classification;
use crate::error::Error;
use crate::header::{CiphertextHeader, HEADER_SIZE, NONCE_SIZE};
use crate::kdf::{KeyFingerprint, KeyMaterial};
use aes_gcm::{
    aead::{rand_core::RngCore, Aead, KeyInit, Nonce, OsRng, Payload},
    Aes128Gcm,
};
use std::fmt;

/// Authenticated encryption provider bound to one classification's keys.
pub struct ClassProvider {
    classification: Classification,
    fingerprint: KeyFingerprint,
    cipher: Aes128Gcm,
    keys: KeyMaterial,
}

impl ClassProvider {
    /// Builds a provider from a classification's key pair.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyDerivation` if the cipher or fingerprint cannot be keyed.
    pub fn new(classification: Classification, keys: KeyMaterial) -> Result<Self, Error> {
        let cipher = Aes128Gcm::new_from_slice(keys.encryption_key())
            .map_err(|e| Error::KeyDerivation(format!("invalid encryption key: {e}")))?;
        let fingerprint = keys.fingerprint(classification.as_str())?;

        Ok(Self {
            classification,
            fingerprint,
            cipher,
            keys,
        })
    }

    /// Returns the classification this provider serves.
    #[must_use]
    pub const fn classification(&self) -> Classification {
        self.classification
    }

    /// Returns the fingerprint of the provider's key generation.
    #[must_use]
    pub const fn fingerprint(&self) -> KeyFingerprint {
        self.fingerprint
    }

    /// Returns the key pair backing this provider.
    #[must_use]
    pub const fn key_material(&self) -> &KeyMaterial {
        &self.keys
    }

    /// Encrypts `plaintext` under a fresh random nonce.
    ///
    /// # Returns
    ///
    /// `[header][ciphertext || tag]`
    ///
    /// # Errors
    ///
    /// Returns `Error::Encryption` if the AEAD operation fails.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);

        let header = CiphertextHeader::new(self.classification, self.fingerprint, nonce_bytes);
        let header_bytes = header.to_bytes();

        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::<Aes128Gcm>::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad: &header_bytes,
                },
            )
            .map_err(|e| Error::Encryption(format!("AES-128-GCM encryption failed: {e}")))?;

        let mut result = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
        result.extend_from_slice(&header_bytes);
        result.extend_from_slice(&ciphertext);

        Ok(result)
    }

    /// Decrypts a value produced by [`ClassProvider::seal`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Decryption` for every failure: malformed header,
    /// classification or fingerprint mismatch, or a failed tag check.
    pub fn open(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        let (header, header_len) =
            CiphertextHeader::from_bytes(data).map_err(|_| Error::Decryption)?;

        if header.classification() != self.classification
            || header.fingerprint() != self.fingerprint
        {
            return Err(Error::Decryption);
        }

        self.cipher
            .decrypt(
                Nonce::<Aes128Gcm>::from_slice(header.nonce()),
                Payload {
                    msg: &data[header_len..],
                    aad: &data[..header_len],
                },
            )
            .map_err(|_| Error::Decryption)
    }
}

impl fmt::Debug for ClassProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassProvider")
            .field("classification", &self.classification)
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::derive_for;
    use secrecy::SecretVec;

    fn provider(classification: Classification, seed: u8) -> ClassProvider {
        let root = SecretVec::new(vec![seed; 32]);
        let keys = derive_for(&root, classification).expect("derivation failed");
        ClassProvider::new(classification, keys).expect("provider build failed")
    }

    #[test]
    fn test_seal_open_round_trip() {
        let provider = provider(Classification::Personal, 1);

        let sealed = provider.seal(b"alice@example.com").expect("Encryption failed");
        let opened = provider.open(&sealed).expect("Decryption failed");

        assert_eq!(opened, b"alice@example.com");
    }

    #[test]
    fn test_seal_uses_fresh_nonce() {
        let provider = provider(Classification::Personal, 1);

        let sealed1 = provider.seal(b"same").unwrap();
        let sealed2 = provider.seal(b"same").unwrap();

        assert_ne!(sealed1, sealed2);
    }

    #[test]
    fn test_sealed_layout() {
        let provider = provider(Classification::Health, 1);
        let sealed = provider.seal(b"abc").unwrap();

        // header + plaintext + 16-byte tag
        assert_eq!(sealed.len(), HEADER_SIZE + 3 + 16);
        let (header, _) = CiphertextHeader::from_bytes(&sealed).unwrap();
        assert_eq!(header.classification(), Classification::Health);
        assert_eq!(header.fingerprint(), provider.fingerprint());
    }

    #[test]
    fn test_open_with_other_classification_fails() {
        let personal = provider(Classification::Personal, 1);
        let health = provider(Classification::Health, 1);

        let sealed = personal.seal(b"secret").unwrap();
        assert!(matches!(health.open(&sealed), Err(Error::Decryption)));
    }

    #[test]
    fn test_open_with_other_generation_fails() {
        let old = provider(Classification::Audit, 1);
        let new = provider(Classification::Audit, 2);

        let sealed = old.seal(b"secret").unwrap();
        assert!(matches!(new.open(&sealed), Err(Error::Decryption)));
    }

    #[test]
    fn test_tampered_header_fails() {
        let provider = provider(Classification::Critical, 1);
        let mut sealed = provider.seal(b"secret").unwrap();

        // flip a nonce bit; header is associated data
        sealed[HEADER_SIZE - 1] ^= 0x01;
        assert!(matches!(provider.open(&sealed), Err(Error::Decryption)));
    }

    #[test]
    fn test_tampered_body_fails() {
        let provider = provider(Classification::Critical, 1);
        let mut sealed = provider.seal(b"secret").unwrap();

        let len = sealed.len();
        sealed[len - 1] ^= 0xFF;
        assert!(matches!(provider.open(&sealed), Err(Error::Decryption)));
    }

    #[test]
    fn test_truncated_input_fails() {
        let provider = provider(Classification::Baseline, 1);
        assert!(matches!(provider.open(&[1, 0, 0]), Err(Error::Decryption)));
        assert!(matches!(provider.open(&[]), Err(Error::Decryption)));
    }
}
