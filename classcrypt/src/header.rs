//! Ciphertext header format.
//!
//! The header carries everything decryption needs apart from the key itself:
//! - Protocol version
//! - Classification wire id
//! - Fingerprint of the key generation that sealed the value
//! - Nonce
//!
//! The serialized header doubles as AEAD associated data, so none of its fields
//! can be altered without failing authentication.

use crate::classification::Classification;
use crate::error::Error;
use crate::kdf::{KeyFingerprint, FINGERPRINT_SIZE};

/// Protocol version for the ciphertext format.
pub const PROTOCOL_VERSION: u8 = 1;

/// Nonce size for AES-GCM (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Serialized header length in bytes.
pub const HEADER_SIZE: usize = 1 + 1 + FINGERPRINT_SIZE + NONCE_SIZE;

/// Ciphertext header.
///
/// Format:
/// ```text
/// [version:1][classification:1][fingerprint:8][nonce:12]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiphertextHeader {
    version: u8,
    classification: Classification,
    fingerprint: KeyFingerprint,
    nonce: [u8; NONCE_SIZE],
}

impl CiphertextHeader {
    /// Creates a header for the current protocol version.
    #[must_use]
    pub const fn new(
        classification: Classification,
        fingerprint: KeyFingerprint,
        nonce: [u8; NONCE_SIZE],
    ) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            classification,
            fingerprint,
            nonce,
        }
    }

    /// Returns the protocol version.
    #[must_use]
    pub const fn version(&self) -> u8 {
        self.version
    }

    /// Returns the classification the value was sealed under.
    #[must_use]
    pub const fn classification(&self) -> Classification {
        self.classification
    }

    /// Returns the key fingerprint.
    #[must_use]
    pub const fn fingerprint(&self) -> KeyFingerprint {
        self.fingerprint
    }

    /// Returns the nonce.
    #[must_use]
    pub const fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    /// Serializes the header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0] = self.version;
        bytes[1] = self.classification.id();
        bytes[2..2 + FINGERPRINT_SIZE].copy_from_slice(self.fingerprint.as_bytes());
        bytes[2 + FINGERPRINT_SIZE..].copy_from_slice(&self.nonce);
        bytes
    }

    /// Deserializes a header from the front of `data`.
    ///
    /// Returns the header and the number of bytes consumed.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHeader` if:
    /// - The data is too short
    /// - The version is not supported
    /// - The classification id is unknown
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize), Error> {
        if data.is_empty() {
            return Err(Error::InvalidHeader("empty header data".to_string()));
        }

        let version = data[0];
        if version != PROTOCOL_VERSION {
            return Err(Error::InvalidHeader(format!(
                "unsupported version: {version} (supported: {PROTOCOL_VERSION})"
            )));
        }

        if data.len() < HEADER_SIZE {
            return Err(Error::InvalidHeader(format!(
                "header truncated: {} bytes (need {HEADER_SIZE})",
                data.len()
            )));
        }

        let classification = Classification::from_id(data[1])
            .ok_or_else(|| {
                Error::InvalidHeader(format!("unknown classification id: {}", data[1]))
            })?;

        let mut fingerprint = [0u8; FINGERPRINT_SIZE];
        fingerprint.copy_from_slice(&data[2..2 + FINGERPRINT_SIZE]);

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&data[2 + FINGERPRINT_SIZE..HEADER_SIZE]);

        let header = Self {
            version,
            classification,
            fingerprint: KeyFingerprint::from_bytes(fingerprint),
            nonce,
        };

        Ok((header, HEADER_SIZE))
    }
}
