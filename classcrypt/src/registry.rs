//! Classification registry.
//!
//! The registry owns one [`BindingTable`]: a provider for every
//! classification plus the rotation epoch that produced it. Readers take an
//! `Arc` snapshot of the table under a short read lock and work against that
//! snapshot, so a rotation swapping in a new table is observed all at once.
//! A reader never sees some classifications rotated and others not.

use crate::classification::Classification;
use crate::error::{Error, KeyRetrievalError};
use crate::kdf::{derive_for, KeyFingerprint};
use crate::provider::ClassProvider;
use secrecy::SecretVec;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

/// Complete set of provider bindings for one key generation.
#[derive(Debug)]
pub struct BindingTable {
    epoch: u64,
    providers: Box<[ClassProvider]>,
}

impl BindingTable {
    /// Derives a provider for every classification.
    ///
    /// All-or-nothing: the first failing classification aborts the build.
    fn derive(root_key: &SecretVec<u8>, epoch: u64) -> Result<Self, Error> {
        let providers = Classification::ALL
            .into_iter()
            .map(|class| {
                derive_for(root_key, class).and_then(|keys| ClassProvider::new(class, keys))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            epoch,
            providers: providers.into_boxed_slice(),
        })
    }

    /// Returns the rotation epoch (0 for the initial table).
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns the provider bound to `classification`.
    #[must_use]
    pub fn provider(&self, classification: Classification) -> &ClassProvider {
        &self.providers[classification.index()]
    }

    /// Returns every classification with its key fingerprint.
    #[must_use]
    pub fn fingerprints(&self) -> Vec<(Classification, KeyFingerprint)> {
        self.providers.iter().map(|p| (p.classification(), p.fingerprint())).collect()
    }

    fn same_keys_as(&self, other: &Self) -> bool {
        self.providers
            .iter()
            .zip(other.providers.iter())
            .all(|(a, b)| a.fingerprint() == b.fingerprint())
    }
}

/// Provider lookup result, pinned to the table snapshot it came from.
///
/// A handle keeps working with its original keys even if a rotation swaps
/// the registry's table while the handle is alive.
#[derive(Debug, Clone)]
pub struct ProviderHandle {
    table: Arc<BindingTable>,
    classification: Classification,
}

impl ProviderHandle {
    /// Returns the epoch of the table this handle is pinned to.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.table.epoch()
    }
}

impl Deref for ProviderHandle {
    type Target = ClassProvider;

    fn deref(&self) -> &Self::Target {
        self.table.provider(self.classification)
    }
}

/// Registry of per-classification providers with atomic whole-table rotation.
///
/// # Example
///
/// ```
/// use classcrypt::classification::Classification;
/// use classcrypt::registry::Registry;
/// use secrecy::SecretVec;
///
/// let registry = Registry::initialize(&SecretVec::new(vec![1u8; 32])).unwrap();
/// let provider = registry.lookup(Classification::Personal);
/// let sealed = provider.seal(b"alice@example.com").unwrap();
///
/// registry.rotate(&SecretVec::new(vec![2u8; 32])).unwrap();
/// assert_eq!(registry.epoch(), 1);
/// // the pinned handle still holds the old keys
/// assert_eq!(provider.open(&sealed).unwrap(), b"alice@example.com");
/// ```
#[derive(Debug)]
pub struct Registry {
    table: RwLock<Arc<BindingTable>>,
    rotating: AtomicBool,
}

impl Registry {
    /// Derives keys for every classification and builds the registry.
    ///
    /// # Errors
    ///
    /// Returns `Error::RegistryInit` if any classification fails to derive;
    /// no partially populated registry is ever returned.
    pub fn initialize(root_key: &SecretVec<u8>) -> Result<Self, Error> {
        let table = BindingTable::derive(root_key, 0).map_err(|e| {
            warn!(error = %e, "classification registry initialization failed");
            Error::RegistryInit(e.to_string())
        })?;

        info!(classifications = Classification::COUNT, "classification registry initialized");

        Ok(Self {
            table: RwLock::new(Arc::new(table)),
            rotating: AtomicBool::new(false),
        })
    }

    /// Returns the current binding table.
    #[must_use]
    pub fn snapshot(&self) -> Arc<BindingTable> {
        // the lock only guards an Arc swap, so a poisoned lock still holds a whole table
        Arc::clone(&self.table.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Returns the provider for `classification` from the current table.
    #[must_use]
    pub fn lookup(&self, classification: Classification) -> ProviderHandle {
        ProviderHandle {
            table: self.snapshot(),
            classification,
        }
    }

    /// Returns the provider for a classification name.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownClassification` if `name` is not a known classification.
    pub fn lookup_name(&self, name: &str) -> Result<ProviderHandle, Error> {
        let classification = name.parse::<Classification>()?;
        Ok(self.lookup(classification))
    }

    /// Returns the current rotation epoch.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.snapshot().epoch()
    }

    /// Returns the current key fingerprint of every classification.
    #[must_use]
    pub fn fingerprints(&self) -> Vec<(Classification, KeyFingerprint)> {
        self.snapshot().fingerprints()
    }

    /// Returns `true` while a rotation is running.
    #[must_use]
    pub fn is_rotating(&self) -> bool {
        self.rotating.load(Ordering::Acquire)
    }

    /// Re-derives every classification from `root_key` and swaps the table.
    ///
    /// Returns the new epoch.
    ///
    /// # Errors
    ///
    /// - `Error::RotationInProgress` if another rotation is running
    /// - `Error::RotationFailed` if derivation fails or the keys would not change
    pub fn rotate(&self, root_key: &SecretVec<u8>) -> Result<u64, Error> {
        let _guard = self.begin_rotation()?;
        self.rebuild(root_key)
    }

    /// Fetches a root key with `fetch` and rotates to it.
    ///
    /// The fetch runs inside the rotation's exclusion window, so a second
    /// rotation requested while the custodian is being queried is rejected.
    ///
    /// # Errors
    ///
    /// - `Error::RotationInProgress` if another rotation is running
    /// - `Error::RotationFailed` if the fetch or derivation fails or the keys
    ///   would not change
    pub fn rotate_with<F>(&self, fetch: F) -> Result<u64, Error>
    where
        F: FnOnce() -> Result<SecretVec<u8>, KeyRetrievalError>,
    {
        let guard = self.begin_rotation()?;
        self.rotate_claimed(&guard, fetch)
    }

    /// Rotates under a claim already taken with [`Registry::begin_rotation`].
    pub(crate) fn rotate_claimed<F>(
        &self,
        _claim: &RotationGuard<'_>,
        fetch: F,
    ) -> Result<u64, Error>
    where
        F: FnOnce() -> Result<SecretVec<u8>, KeyRetrievalError>,
    {
        let root_key = fetch().map_err(|e| {
            warn!(error = %e, "root key retrieval failed during rotation");
            Error::RotationFailed(format!("root key retrieval failed: {e}"))
        })?;
        self.rebuild(&root_key)
    }

    pub(crate) fn begin_rotation(&self) -> Result<RotationGuard<'_>, Error> {
        self.rotating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::RotationInProgress)?;
        Ok(RotationGuard {
            flag: &self.rotating,
        })
    }

    fn rebuild(&self, root_key: &SecretVec<u8>) -> Result<u64, Error> {
        let current = self.snapshot();
        let epoch = current.epoch() + 1;

        let next = BindingTable::derive(root_key, epoch).map_err(|e| {
            warn!(error = %e, "key rotation failed");
            Error::RotationFailed(e.to_string())
        })?;

        if next.same_keys_as(&current) {
            warn!(epoch = current.epoch(), "key rotation rejected: root key unchanged");
            return Err(Error::RotationFailed("root key unchanged".to_string()));
        }

        *self.table.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        info!(epoch, "classification keys rotated");

        Ok(epoch)
    }
}

/// Clears the rotation flag when the rotation ends, successfully or not.
pub(crate) struct RotationGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for RotationGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(seed: u8) -> SecretVec<u8> {
        SecretVec::new(vec![seed; 32])
    }

    #[test]
    fn test_initialize_binds_every_classification() {
        let registry = Registry::initialize(&root(1)).expect("init failed");

        for class in Classification::ALL {
            assert_eq!(registry.lookup(class).classification(), class);
        }
        assert_eq!(registry.epoch(), 0);
        assert_eq!(registry.fingerprints().len(), Classification::COUNT);
    }

    #[test]
    fn test_rotated_table_binds_every_classification() {
        let registry = Registry::initialize(&root(1)).unwrap();
        registry.rotate(&root(2)).unwrap();

        let table = registry.snapshot();
        for class in Classification::ALL {
            assert_eq!(table.provider(class).classification(), class);
        }
        assert_eq!(table.fingerprints().len(), Classification::COUNT);
    }

    #[test]
    fn test_initialize_empty_root_key_fails() {
        let result = Registry::initialize(&SecretVec::new(Vec::new()));
        assert!(matches!(result, Err(Error::RegistryInit(_))));
    }

    #[test]
    fn test_fingerprints_are_distinct_per_classification() {
        let registry = Registry::initialize(&root(1)).unwrap();
        let mut prints: Vec<_> = registry.fingerprints().into_iter().map(|(_, fp)| fp).collect();
        prints.sort_by_key(|fp| *fp.as_bytes());
        prints.dedup();
        assert_eq!(prints.len(), Classification::COUNT);
    }

    #[test]
    fn test_lookup_name() {
        let registry = Registry::initialize(&root(1)).unwrap();

        let handle = registry.lookup_name("credential").expect("lookup failed");
        assert_eq!(handle.classification(), Classification::Credential);

        let result = registry.lookup_name("nope");
        assert!(matches!(result, Err(Error::UnknownClassification(_))));
    }

    #[test]
    fn test_rotate_replaces_all_keys() {
        let registry = Registry::initialize(&root(1)).unwrap();
        let before = registry.fingerprints();

        let epoch = registry.rotate(&root(2)).expect("rotation failed");
        assert_eq!(epoch, 1);
        assert_eq!(registry.epoch(), 1);

        let after = registry.fingerprints();
        for ((class_a, fp_a), (class_b, fp_b)) in before.iter().zip(after.iter()) {
            assert_eq!(class_a, class_b);
            assert_ne!(fp_a, fp_b);
        }
    }

    #[test]
    fn test_rotate_with_unchanged_root_fails() {
        let registry = Registry::initialize(&root(1)).unwrap();

        let result = registry.rotate(&root(1));
        assert!(matches!(result, Err(Error::RotationFailed(_))));
        assert_eq!(registry.epoch(), 0);
    }

    #[test]
    fn test_rotate_with_empty_root_keeps_table() {
        let registry = Registry::initialize(&root(1)).unwrap();
        let before = registry.fingerprints();

        let result = registry.rotate(&SecretVec::new(Vec::new()));
        assert!(matches!(result, Err(Error::RotationFailed(_))));
        assert_eq!(registry.fingerprints(), before);
        assert!(!registry.is_rotating());
    }

    #[test]
    fn test_rotate_with_failed_fetch_keeps_table() {
        let registry = Registry::initialize(&root(1)).unwrap();

        let result = registry
            .rotate_with(|| Err(KeyRetrievalError::Unavailable("vault offline".to_string())));
        assert!(matches!(result, Err(Error::RotationFailed(_))));
        assert_eq!(registry.epoch(), 0);
        assert!(!registry.is_rotating());
    }

    #[test]
    fn test_rotation_is_exclusive() {
        let registry = Registry::initialize(&root(1)).unwrap();

        let guard = registry.begin_rotation().expect("first rotation should start");
        assert!(registry.is_rotating());
        assert!(matches!(registry.rotate(&root(2)), Err(Error::RotationInProgress)));
        drop(guard);

        assert_eq!(registry.rotate(&root(2)).unwrap(), 1);
    }

    #[test]
    fn test_handle_pins_snapshot() {
        let registry = Registry::initialize(&root(1)).unwrap();
        let old = registry.lookup(Classification::Health);
        let old_sealed = old.seal(b"blood type").unwrap();

        registry.rotate(&root(2)).unwrap();
        let new = registry.lookup(Classification::Health);
        let new_sealed = new.seal(b"blood type").unwrap();

        assert_eq!(old.epoch(), 0);
        assert_eq!(new.epoch(), 1);
        assert_eq!(old.open(&old_sealed).unwrap(), b"blood type");
        assert!(matches!(old.open(&new_sealed), Err(Error::Decryption)));
        assert!(matches!(new.open(&old_sealed), Err(Error::Decryption)));
    }
}
