//! The [`StoreEngine`] trait: the single-file database the migrator drives.
//!
//! The migrator never touches store files itself. Every read, transform,
//! replace and delete goes through an engine handle passed in by the caller,
//! so the orchestration works the same for any backend.

use std::path::Path;

use crate::{
  mapping::Mapping,
  metadata::{StorageType, StoreMetadata},
  planner::MigrationStep,
};

pub trait StoreEngine {
  type Error: std::error::Error + Send + Sync + 'static;

  fn storage_type(&self) -> StorageType;

  /// Extension given to temporary stores, without the leading dot.
  fn file_extension(&self) -> &'static str;

  fn store_exists(&self, location: &Path) -> bool { location.is_file() }

  /// Read a store's metadata without opening it for writing.
  fn read_metadata(&self, location: &Path) -> Result<StoreMetadata, Self::Error>;

  /// Write the data of the store at `source`, transformed by `mapping`, into
  /// a new store at `destination` saved with `step.target_model`.
  ///
  /// `destination` must not exist. `source` is never modified.
  fn migrate_store(
    &self,
    source: &Path,
    step: &MigrationStep,
    mapping: &Mapping,
    destination: &Path,
  ) -> Result<(), Self::Error>;

  /// Atomically replace the contents of the store at `destination` with those
  /// of the store at `source`. On failure `destination` keeps its previous
  /// contents.
  fn replace_store(&self, destination: &Path, source: &Path) -> Result<(), Self::Error>;

  /// Delete a store and any side files the engine keeps next to it.
  /// Destroying a store that does not exist succeeds.
  fn destroy_store(&self, location: &Path) -> Result<(), Self::Error>;
}
