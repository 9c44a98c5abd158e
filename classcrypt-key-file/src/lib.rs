//! File-based root key custodian for `classcrypt`.
//!
//! This custodian stores root keys in the filesystem and is suitable for
//! development and testing environments.

#![warn(clippy::pedantic, clippy::nursery)]

use classcrypt::error::KeyRetrievalError;
use classcrypt::key_source::RootKeySource;
use rand::RngCore;
use secrecy::SecretVec;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use zeroize::Zeroizing;

/// Root key size in bytes (256 bits).
pub const ROOT_KEY_SIZE: usize = 32;

const CURRENT_FILE: &str = "current";

/// File-based root key custodian for development and testing.
///
/// Keys are stored in the filesystem with the following structure:
/// ```text
/// keys/
/// ├── root_v1.key     (32 bytes, 0600 permissions)
/// ├── root_v2.key     (32 bytes, 0600 permissions)
/// └── current         (active version number, e.g. "2")
/// ```
#[derive(Debug)]
pub struct FileRootKeySource {
    key_dir: PathBuf,
}

impl FileRootKeySource {
    /// Opens an existing key directory.
    ///
    /// # Arguments
    ///
    /// * `key_dir` - Directory containing key files
    ///
    /// # Errors
    ///
    /// Returns `KeyRetrievalError::NotFound` if the directory doesn't exist.
    pub fn new(key_dir: impl Into<PathBuf>) -> Result<Self, KeyRetrievalError> {
        let key_dir = key_dir.into();
        if !key_dir.is_dir() {
            return Err(KeyRetrievalError::NotFound(format!(
                "key directory does not exist: {}",
                key_dir.display()
            )));
        }
        Ok(Self { key_dir })
    }

    /// Initializes a key directory with a fresh version-1 root key.
    ///
    /// # Errors
    ///
    /// Returns error if the directory already holds keys, or if directory
    /// creation or key generation fails.
    pub fn init(key_dir: impl Into<PathBuf>) -> Result<Self, KeyRetrievalError> {
        let key_dir = key_dir.into();
        fs::create_dir_all(&key_dir)?;

        if key_dir.join(CURRENT_FILE).exists() {
            return Err(KeyRetrievalError::Unavailable(format!(
                "key directory already initialized: {}",
                key_dir.display()
            )));
        }

        let source = Self { key_dir };
        source.write_version(1)?;
        info!(dir = %source.key_dir.display(), "root key directory initialized");
        Ok(source)
    }

    /// Returns the key directory.
    #[must_use]
    pub fn key_dir(&self) -> &Path {
        &self.key_dir
    }

    /// Returns the active root key version.
    ///
    /// # Errors
    ///
    /// Returns error if the `current` file is missing or malformed.
    pub fn current_version(&self) -> Result<u32, KeyRetrievalError> {
        let path = self.key_dir.join(CURRENT_FILE);
        if !path.exists() {
            return Err(KeyRetrievalError::NotFound("no active root key".to_string()));
        }
        let contents = fs::read_to_string(path)?;
        contents
            .trim()
            .parse()
            .map_err(|_| KeyRetrievalError::InvalidKey(format!("malformed version: {contents:?}")))
    }

    /// Generates the next root key version and makes it active.
    ///
    /// Older versions stay on disk so a recovery can fall back to them.
    ///
    /// # Errors
    ///
    /// Returns error if reading the current version or writing the new key fails.
    pub fn rotate_root_key(&self) -> Result<u32, KeyRetrievalError> {
        let next = self.current_version()? + 1;
        self.write_version(next)?;
        info!(version = next, "root key rotated");
        Ok(next)
    }

    fn key_path(&self, version: u32) -> PathBuf {
        self.key_dir.join(format!("root_v{version}.key"))
    }

    fn write_version(&self, version: u32) -> Result<(), KeyRetrievalError> {
        let mut key = Zeroizing::new([0u8; ROOT_KEY_SIZE]);
        rand::rngs::OsRng.fill_bytes(&mut key[..]);

        let path = self.key_path(version);
        let mut file = create_private(&path)?;
        file.write_all(&key[..])?;
        file.sync_all()?;

        // repoint only after the key is durable
        let tmp = self.key_dir.join(format!("{CURRENT_FILE}.tmp"));
        fs::write(&tmp, version.to_string())?;
        fs::rename(tmp, self.key_dir.join(CURRENT_FILE))?;
        Ok(())
    }
}

impl RootKeySource for FileRootKeySource {
    fn fetch_root_key(&self) -> Result<SecretVec<u8>, KeyRetrievalError> {
        let version = self.current_version()?;
        let path = self.key_path(version);
        if !path.exists() {
            return Err(KeyRetrievalError::NotFound(format!("root_v{version}")));
        }

        let key = fs::read(path)?;
        if key.len() != ROOT_KEY_SIZE {
            return Err(KeyRetrievalError::InvalidKey(format!(
                "root_v{version} has {} bytes (expected {ROOT_KEY_SIZE})",
                key.len()
            )));
        }
        Ok(SecretVec::new(key))
    }
}

#[cfg(unix)]
fn create_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new().write(true).create_new(true).mode(0o600).open(path)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new().write(true).create_new(true).open(path)
}
