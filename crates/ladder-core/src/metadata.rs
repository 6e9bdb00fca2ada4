//! Store metadata: what a store was last saved with, read without loading it.

use std::{collections::BTreeSet, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result, engine::StoreEngine, inventory::SchemaInventory,
  schema::SchemaModel,
};

/// The kind of single-file database backing a store.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[non_exhaustive]
pub enum StorageType {
  Sqlite,
}

/// The out-of-band record every store persists alongside its data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetadata {
  pub storage_type:        StorageType,
  /// Version identifiers of the model the store was last saved with.
  pub version_identifiers: BTreeSet<String>,
  /// [`SchemaModel::structural_hash`] of that model.
  pub structural_hash:     String,
}

impl StoreMetadata {
  /// Metadata describing a store saved with `model`.
  pub fn for_model(storage_type: StorageType, model: &SchemaModel) -> Self {
    Self {
      storage_type,
      version_identifiers: model.version_identifiers.clone(),
      structural_hash: model.structural_hash(),
    }
  }

  /// The single identifier that names a version of `inventory`.
  ///
  /// Fails with [`Error::AmbiguousOrMissingVersion`] when none or several of
  /// the identifiers are known, since the source version would then be a
  /// guess.
  pub fn resolve_version_name<'a>(
    &'a self,
    inventory: &SchemaInventory,
  ) -> Result<&'a str> {
    let mut known = self
      .version_identifiers
      .iter()
      .filter(|name| inventory.contains(name.as_str()));

    match (known.next(), known.next()) {
      (Some(name), None) => Ok(name.as_str()),
      _ => Err(Error::AmbiguousOrMissingVersion {
        identifiers: self.version_identifiers.clone(),
      }),
    }
  }
}

// ─── Reader ──────────────────────────────────────────────────────────────────

/// Inspects store metadata through a [`StoreEngine`] without opening the
/// store for reading or writing its data.
pub struct StoreMetadataReader<'a, E> {
  engine: &'a E,
}

impl<'a, E: StoreEngine> StoreMetadataReader<'a, E> {
  pub fn new(engine: &'a E) -> Self { Self { engine } }

  /// Read the metadata of the store at `location`.
  ///
  /// A missing store yields [`Error::MissingStore`], which callers treat as
  /// "nothing to migrate yet".
  pub fn read(
    &self,
    location: &Path,
    storage_type: StorageType,
  ) -> Result<StoreMetadata> {
    let expected = self.engine.storage_type();
    if storage_type != expected {
      return Err(Error::StorageTypeMismatch { expected, found: storage_type });
    }

    if !self.engine.store_exists(location) {
      return Err(Error::MissingStore(location.to_owned()));
    }

    let metadata =
      self
        .engine
        .read_metadata(location)
        .map_err(|cause| Error::Metadata {
          path:  location.to_owned(),
          cause: Box::new(cause),
        })?;

    if metadata.storage_type != storage_type {
      return Err(Error::StorageTypeMismatch {
        expected: storage_type,
        found:    metadata.storage_type,
      });
    }

    Ok(metadata)
  }
}
