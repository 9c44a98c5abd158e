//! Field-to-classification mapping for persistence layers.
//!
//! Which fields are encrypted, and under which classification, is declared
//! statically, either with [`FieldMap`] or with `#[derive(Classified)]` from
//! `classcrypt-derive`. The persistence layer registers the resulting
//! converters once and calls them around every read and write.

use crate::classification::Classification;
use crate::engine::Engine;
use crate::error::Error;
use crate::state::SecurityState;
use std::collections::HashMap;

/// One classified field of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field identifier.
    pub name: &'static str,
    /// Classification protecting the field.
    pub classification: Classification,
}

/// A field type the engine knows how to seal in place.
pub trait FieldValue {
    /// Replaces the plaintext value with its ciphertext.
    ///
    /// # Errors
    ///
    /// Returns `Error::Encryption` if the AEAD operation fails.
    fn seal_with(&mut self, engine: &Engine, classification: Classification) -> Result<(), Error>;

    /// Replaces the ciphertext value with its plaintext.
    ///
    /// # Errors
    ///
    /// Returns the engine's decryption errors.
    fn open_with(
        &mut self,
        engine: &Engine,
        classification: Classification,
        state: SecurityState,
    ) -> Result<(), Error>;
}

impl FieldValue for String {
    fn seal_with(&mut self, engine: &Engine, classification: Classification) -> Result<(), Error> {
        *self = engine.encrypt(self, classification)?;
        Ok(())
    }

    fn open_with(
        &mut self,
        engine: &Engine,
        classification: Classification,
        state: SecurityState,
    ) -> Result<(), Error> {
        *self = engine.decrypt(self, classification, state)?;
        Ok(())
    }
}

impl FieldValue for Option<String> {
    fn seal_with(&mut self, engine: &Engine, classification: Classification) -> Result<(), Error> {
        if let Some(value) = self {
            value.seal_with(engine, classification)?;
        }
        Ok(())
    }

    fn open_with(
        &mut self,
        engine: &Engine,
        classification: Classification,
        state: SecurityState,
    ) -> Result<(), Error> {
        if let Some(value) = self {
            value.open_with(engine, classification, state)?;
        }
        Ok(())
    }
}

/// A record whose classified fields are known at compile time.
///
/// Usually derived:
///
/// ```rust,ignore
/// use classcrypt_derive::Classified;
///
/// #[derive(Classified)]
/// struct Patient {
///     id: u64,
///     #[classified(Personal)]
///     name: String,
///     #[classified(Health)]
///     diagnosis: Option<String>,
/// }
/// ```
pub trait ClassifiedRecord {
    /// Classified fields, in declaration order.
    const FIELDS: &'static [FieldSpec];

    /// Encrypts every classified field in place.
    ///
    /// # Errors
    ///
    /// Returns the first field's encryption error; earlier fields stay sealed.
    fn seal(&mut self, engine: &Engine) -> Result<(), Error>;

    /// Decrypts every classified field in place.
    ///
    /// # Errors
    ///
    /// Returns the first field's decryption error; earlier fields stay opened.
    fn open(&mut self, engine: &Engine, state: SecurityState) -> Result<(), Error>;

    /// Returns the classification of `field`, if it is classified.
    #[must_use]
    fn classification_of(field: &str) -> Option<Classification> {
        Self::FIELDS.iter().find(|spec| spec.name == field).map(|spec| spec.classification)
    }
}

/// Explicit field identifier → classification mapping, built once at
/// configuration time.
///
/// # Example
///
/// ```
/// use classcrypt::classification::Classification;
/// use classcrypt::record::FieldMap;
///
/// let fields = FieldMap::builder()
///     .field("sensitive_data.highly_confidential", Classification::Critical)
///     .field("sensitive_data.baseline_data", Classification::Baseline)
///     .build();
///
/// assert_eq!(
///     fields.classification_of("sensitive_data.highly_confidential"),
///     Some(Classification::Critical)
/// );
/// assert_eq!(fields.classification_of("sensitive_data.last_modified"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FieldMap {
    fields: HashMap<String, Classification>,
}

impl FieldMap {
    /// Starts an empty mapping.
    #[must_use]
    pub fn builder() -> FieldMapBuilder {
        FieldMapBuilder::default()
    }

    /// Builds the mapping for a [`ClassifiedRecord`], prefixing each field with `scope.`.
    #[must_use]
    pub fn for_record<R: ClassifiedRecord>(scope: &str) -> Self {
        R::FIELDS
            .iter()
            .fold(Self::builder(), |b, spec| {
                b.field(format!("{scope}.{}", spec.name), spec.classification)
            })
            .build()
    }

    /// Returns the classification of `field`, if it is classified.
    #[must_use]
    pub fn classification_of(&self, field: &str) -> Option<Classification> {
        self.fields.get(field).copied()
    }

    /// Returns the number of classified fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if no field is classified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns a value converter for `field`, or `None` if the field is not classified.
    #[must_use]
    pub fn converter(&self, engine: &Engine, field: &str) -> Option<FieldConverter> {
        self.classification_of(field)
            .map(|classification| FieldConverter {
                engine: engine.clone(),
                classification,
            })
    }
}

/// Builder for [`FieldMap`].
#[derive(Debug, Default)]
pub struct FieldMapBuilder {
    fields: HashMap<String, Classification>,
}

impl FieldMapBuilder {
    /// Classifies `field`. A repeated field keeps the last classification.
    #[must_use]
    pub fn field(mut self, field: impl Into<String>, classification: Classification) -> Self {
        self.fields.insert(field.into(), classification);
        self
    }

    /// Finishes the mapping.
    #[must_use]
    pub fn build(self) -> FieldMap {
        FieldMap {
            fields: self.fields,
        }
    }
}

/// Storage value converter for one classified field.
#[derive(Debug, Clone)]
pub struct FieldConverter {
    engine: Engine,
    classification: Classification,
}

impl FieldConverter {
    /// Returns the field's classification.
    #[must_use]
    pub const fn classification(&self) -> Classification {
        self.classification
    }

    /// Converts a model value to its stored form.
    ///
    /// # Errors
    ///
    /// Returns `Error::Encryption` if the AEAD operation fails.
    pub fn to_storage(&self, value: Option<&str>) -> Result<Option<String>, Error> {
        self.engine.encrypt_opt(value, self.classification)
    }

    /// Converts a stored value back to its model form.
    ///
    /// # Errors
    ///
    /// Returns the engine's decryption errors.
    pub fn from_storage(
        &self,
        value: Option<&str>,
        state: SecurityState,
    ) -> Result<Option<String>, Error> {
        self.engine.decrypt_opt(value, self.classification, state)
    }
}
