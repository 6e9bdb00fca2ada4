//! Temporary stores written by migration steps.
//!
//! Every temporary lives in one directory under a name tagged with the
//! migration's id, so leftovers of an interrupted process can be found and
//! collected. [`TemporaryStores`] destroys whatever it still tracks when it is
//! dropped, on success and on every error path alike.

use std::{
  mem,
  path::{Path, PathBuf},
};

use uuid::Uuid;

use crate::{engine::StoreEngine, logging::MigrationLogger};

/// Prefix shared by every temporary store file name.
pub const ARTIFACT_PREFIX: &str = "ladder-migration-";

/// File name prefix of the temporaries of one migration.
pub fn artifact_prefix(migration_id: Uuid) -> String {
  format!("{ARTIFACT_PREFIX}{}-", migration_id.simple())
}

/// Whether `file_name` names a temporary store of any migration.
pub fn is_migration_artifact(file_name: &str) -> bool {
  file_name.starts_with(ARTIFACT_PREFIX)
}

pub struct TemporaryStores<'a, E: StoreEngine> {
  engine:       &'a E,
  logger:       &'a dyn MigrationLogger,
  directory:    PathBuf,
  migration_id: Uuid,
  live:         Vec<PathBuf>,
}

impl<'a, E: StoreEngine> TemporaryStores<'a, E> {
  pub fn new(
    engine: &'a E,
    logger: &'a dyn MigrationLogger,
    directory: impl Into<PathBuf>,
    migration_id: Uuid,
  ) -> Self {
    Self {
      engine,
      logger,
      directory: directory.into(),
      migration_id,
      live: Vec::new(),
    }
  }

  pub fn migration_id(&self) -> Uuid { self.migration_id }

  /// Reserve a fresh location. Nothing is created on disk; the location is
  /// destroyed on release or drop whether or not a store was written there.
  pub fn allocate(&mut self) -> PathBuf {
    let path = self.directory.join(format!(
      "{}{}.{}",
      artifact_prefix(self.migration_id),
      Uuid::new_v4().simple(),
      self.engine.file_extension()
    ));
    self
      .logger
      .debug(&format!("Allocated temporary store {}", path.display()));
    self.live.push(path.clone());
    path
  }

  /// Destroy one temporary now. Paths this guard does not track are ignored.
  pub fn release(&mut self, path: &Path) {
    if let Some(index) = self.live.iter().position(|p| p == path) {
      let path = self.live.remove(index);
      self.destroy(&path);
    }
  }

  fn destroy(&self, path: &Path) {
    match self.engine.destroy_store(path) {
      Ok(()) => {
        self
          .logger
          .debug(&format!("Destroyed temporary store {}", path.display()));
      }
      // Cleanup failures are logged, never returned.
      Err(e) => self.logger.error(&format!(
        "Failed to destroy temporary store {}: {e}",
        path.display()
      )),
    }
  }
}

impl<E: StoreEngine> Drop for TemporaryStores<'_, E> {
  fn drop(&mut self) {
    for path in mem::take(&mut self.live) {
      self.destroy(&path);
    }
  }
}
