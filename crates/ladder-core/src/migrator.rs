//! [`IterativeMigrator`] — upgrades a store through every intermediate
//! version between the one it was saved with and a target version.
//!
//! Each step writes into a fresh temporary store; the original is only
//! touched once, by the engine's atomic replace after the last step
//! succeeded. A failure at any earlier point leaves the original exactly as
//! it was and destroys every temporary.
//!
//! Steps run strictly one after another and cannot be cancelled: a chain
//! runs to completion or to its first failure. Callers must ensure no other
//! writer uses the store while it migrates.

use std::{
  fmt,
  path::{Path, PathBuf},
};

use uuid::Uuid;

use crate::{
  Error, Result,
  engine::StoreEngine,
  inference::{MappingInference, StructuralInference},
  inventory::SchemaInventory,
  logging::{MigrationLogger, TracingLogger},
  mapping::{Mapping, MappingCatalog},
  metadata::StoreMetadataReader,
  oracle::{CompatibilityOracle, StructuralHashOracle},
  planner::{MigrationPlanner, MigrationStep},
  temporary::TemporaryStores,
  version::SchemaVersion,
};

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// What a successful [`IterativeMigrator::migrate`] call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
  /// The store was migrated and now matches the target version.
  Migrated(MigrationReport),
  /// The target model can already open the store; nothing was written.
  AlreadyCompatible,
  /// The store's version and the target version need no steps.
  NoStepsRequired,
  /// No store exists yet at the location; nothing was created.
  MissingStore,
}

impl MigrationOutcome {
  pub fn is_migrated(&self) -> bool { matches!(self, Self::Migrated(_)) }
}

impl fmt::Display for MigrationOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Migrated(report) => write!(
        f,
        "migrated from {} to {} in {} step(s)",
        report.from,
        report.to,
        report.steps.len()
      ),
      Self::AlreadyCompatible => f.write_str("store is already compatible"),
      Self::NoStepsRequired => f.write_str("no migration steps required"),
      Self::MissingStore => f.write_str("no store to migrate"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
  /// Tags the temporary stores this migration created.
  pub migration_id: Uuid,
  pub from:         SchemaVersion,
  pub to:           SchemaVersion,
  /// `(source, target)` of every executed step, in order.
  pub steps:        Vec<(SchemaVersion, SchemaVersion)>,
}

// ─── Migrator ────────────────────────────────────────────────────────────────

pub struct IterativeMigrator<'a, E: StoreEngine> {
  engine:    &'a E,
  inventory: &'a SchemaInventory,
  mappings:  MappingCatalog,
  logger:    Box<dyn MigrationLogger + 'a>,
  oracle:    Box<dyn CompatibilityOracle + 'a>,
  inference: Box<dyn MappingInference + 'a>,
  temp_dir:  PathBuf,
}

impl<'a, E: StoreEngine> IterativeMigrator<'a, E> {
  /// A migrator with structural compatibility and inference, no authored
  /// mappings, `tracing` logging and the OS temporary directory.
  pub fn new(engine: &'a E, inventory: &'a SchemaInventory) -> Self {
    Self {
      engine,
      inventory,
      mappings: MappingCatalog::new(),
      logger: Box::new(TracingLogger),
      oracle: Box::new(StructuralHashOracle),
      inference: Box::new(StructuralInference),
      temp_dir: std::env::temp_dir(),
    }
  }

  pub fn with_mappings(mut self, mappings: MappingCatalog) -> Self {
    self.mappings = mappings;
    self
  }

  pub fn with_logger(mut self, logger: impl MigrationLogger + 'a) -> Self {
    self.logger = Box::new(logger);
    self
  }

  pub fn with_oracle(mut self, oracle: impl CompatibilityOracle + 'a) -> Self {
    self.oracle = Box::new(oracle);
    self
  }

  pub fn with_inference(mut self, inference: impl MappingInference + 'a) -> Self {
    self.inference = Box::new(inference);
    self
  }

  /// Directory temporary stores are written to. Must exist.
  pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
    self.temp_dir = temp_dir.into();
    self
  }

  pub fn temp_dir(&self) -> &Path { &self.temp_dir }

  /// Migrate the store at `store` to the inventory's current version.
  pub fn migrate_to_current(&self, store: &Path) -> Result<MigrationOutcome> {
    self.migrate(store, self.inventory.current_version())
  }

  /// Migrate the store at `store` to `target`.
  ///
  /// Either the store ends up saved with `target`, or it is left exactly as
  /// it was and an error describes what failed.
  pub fn migrate(
    &self,
    store: &Path,
    target: &SchemaVersion,
  ) -> Result<MigrationOutcome> {
    let target_model = self
      .inventory
      .model(target)
      .ok_or_else(|| Error::UnknownVersion(target.name().to_owned()))?;

    // Compatibility.
    let reader = StoreMetadataReader::new(self.engine);
    let metadata = match reader.read(store, self.engine.storage_type()) {
      Ok(metadata) => metadata,
      Err(Error::MissingStore(path)) => {
        self.logger.info(&format!(
          "No store found at {}. Skipping migration.",
          path.display()
        ));
        return Ok(MigrationOutcome::MissingStore);
      }
      Err(e) => {
        self.logger.error(&format!("Failed to read store metadata: {e}"));
        return Err(e);
      }
    };

    if self.oracle.is_compatible(target_model, &metadata) {
      self.logger.info(&format!(
        "Target model {target} is compatible with the store. No migration necessary."
      ));
      return Ok(MigrationOutcome::AlreadyCompatible);
    }

    // Source version.
    let source = metadata
      .resolve_version_name(self.inventory)
      .ok()
      .and_then(|name| self.inventory.version(name))
      .cloned()
      .ok_or_else(|| {
        self.logger.error(&format!(
          "Failed to find source model for version identifiers {:?}",
          metadata.version_identifiers
        ));
        Error::UnableToFindSourceModel {
          identifiers: metadata.version_identifiers.clone(),
        }
      })?;

    // Plan.
    let steps = MigrationPlanner::new(self.inventory)
      .plan(&source, target)
      .inspect_err(|e| self.logger.error(&format!("Failed to plan migration: {e}")))?;

    if steps.is_empty() {
      // Returning here also keeps the replace below from ever pointing the
      // original store at itself.
      self
        .logger
        .info("Skipping migration. Found no steps for migration.");
      return Ok(MigrationOutcome::NoStepsRequired);
    }

    self.execute(store, &steps).map(MigrationOutcome::Migrated)
  }

  /// Run `steps` through temporaries and replace `store` with the result.
  fn execute(&self, store: &Path, steps: &[MigrationStep]) -> Result<MigrationReport> {
    let mut temporaries = TemporaryStores::new(
      self.engine,
      &*self.logger,
      self.temp_dir.clone(),
      Uuid::new_v4(),
    );

    let mut current = store.to_path_buf();
    for step in steps {
      self
        .logger
        .info(&format!("Attempting migration from {step}"));

      let mapping = self.mapping_for(step)?;
      let destination = temporaries.allocate();

      if let Err(cause) =
        self
          .engine
          .migrate_store(&current, step, &mapping, &destination)
      {
        self
          .logger
          .error(&format!("Migration from {step} failed: {cause}"));
        return Err(Error::StepExecutionFailed {
          from:  step.source_version.clone(),
          to:    step.target_version.clone(),
          cause: Box::new(cause),
        });
      }

      // The previous input is a temporary unless this was the first step;
      // at most two copies exist besides the original.
      if current != store {
        temporaries.release(&current);
      }
      current = destination;
    }

    if let Err(cause) = self.engine.replace_store(store, &current) {
      self.logger.fatal(&format!(
        "Failed to replace {} with the migrated store: {cause}",
        store.display()
      ));
      return Err(Error::ReplaceFailed {
        path:  store.to_owned(),
        cause: Box::new(cause),
      });
    }

    temporaries.release(&current);

    Ok(MigrationReport {
      migration_id: temporaries.migration_id(),
      from:         steps[0].source_version.clone(),
      to:           steps[steps.len() - 1].target_version.clone(),
      steps:        steps
        .iter()
        .map(|s| (s.source_version.clone(), s.target_version.clone()))
        .collect(),
    })
  }

  /// The authored mapping for `step`, or an inferred one.
  fn mapping_for(&self, step: &MigrationStep) -> Result<Mapping> {
    if let Some(mapping) = self
      .mappings
      .authored(&step.source_version, &step.target_version)
    {
      self
        .logger
        .debug(&format!("Using authored mapping from {step}"));
      return Ok(mapping.clone());
    }

    self.inference.infer(step).map_err(|reason| {
      self
        .logger
        .error(&format!("No mapping available from {step}: {reason}"));
      Error::NoMappingAvailable {
        from: step.source_version.clone(),
        to: step.target_version.clone(),
        reason,
      }
    })
  }
}
