//! [`SqliteEngine`] — the [`StoreEngine`] for SQLite store files.

use std::path::Path;

use ladder_core::{
  engine::StoreEngine,
  mapping::Mapping,
  metadata::{StorageType, StoreMetadata},
  planner::MigrationStep,
};
use rusqlite::{
  Connection, OpenFlags,
  backup::{Backup, StepResult},
};

use crate::{
  Error, Result,
  store::{SqliteStore, open_read_only, read_info, remove_store_files},
};

/// Extension of store files, without the leading dot.
pub const FILE_EXTENSION: &str = "sqlite";

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteEngine;

impl StoreEngine for SqliteEngine {
  type Error = Error;

  fn storage_type(&self) -> StorageType { StorageType::Sqlite }

  fn file_extension(&self) -> &'static str { FILE_EXTENSION }

  fn read_metadata(&self, location: &Path) -> Result<StoreMetadata> {
    Ok(read_info(&open_read_only(location)?)?.metadata)
  }

  fn migrate_store(
    &self,
    source: &Path,
    step: &MigrationStep,
    mapping: &Mapping,
    destination: &Path,
  ) -> Result<()> {
    let source_conn = open_read_only(source)?;
    let mut store = SqliteStore::create(destination, &step.target_model)?;
    store.import(&source_conn, &step.source_model, mapping)?;

    tracing::debug!(
      source = %source.display(),
      destination = %destination.display(),
      from = %step.source_version,
      to = %step.target_version,
      origin = ?mapping.origin,
      "migrated store"
    );
    Ok(())
  }

  /// Copies `source` over `destination` with the online backup API, which
  /// writes the destination in a single transaction.
  fn replace_store(&self, destination: &Path, source: &Path) -> Result<()> {
    if !destination.is_file() {
      return Err(Error::MissingStore(destination.to_owned()));
    }
    let from = open_read_only(source)?;
    let mut to = Connection::open_with_flags(
      destination,
      OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;

    let backup = Backup::new(&from, &mut to)?;
    match backup.step(-1)? {
      StepResult::Done => {}
      other => return Err(Error::ReplaceIncomplete(format!("{other:?}"))),
    }

    tracing::debug!(
      destination = %destination.display(),
      source = %source.display(),
      "replaced store"
    );
    Ok(())
  }

  fn destroy_store(&self, location: &Path) -> Result<()> {
    remove_store_files(location)
  }
}
