//! Migration planning: the chain of adjacent versions between two versions.

use std::{fmt, sync::Arc};

use crate::{
  Error, Result,
  inventory::SchemaInventory,
  metadata::StoreMetadata,
  oracle::CompatibilityOracle,
  schema::SchemaModel,
  version::SchemaVersion,
};

/// One edge between two adjacent versions of an inventory.
#[derive(Debug, Clone)]
pub struct MigrationStep {
  pub source_version: SchemaVersion,
  pub target_version: SchemaVersion,
  pub source_model:   Arc<SchemaModel>,
  pub target_model:   Arc<SchemaModel>,
}

impl fmt::Display for MigrationStep {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} to {}", self.source_version, self.target_version)
  }
}

pub struct MigrationPlanner<'a> {
  inventory: &'a SchemaInventory,
}

impl<'a> MigrationPlanner<'a> {
  pub fn new(inventory: &'a SchemaInventory) -> Self { Self { inventory } }

  /// The steps leading from `source` to `target`, oldest first.
  ///
  /// An empty plan means there is nothing to do. Migrations only run
  /// forward; a `source` newer than `target` is an error.
  pub fn plan(
    &self,
    source: &SchemaVersion,
    target: &SchemaVersion,
  ) -> Result<Vec<MigrationStep>> {
    let from = self.position(source)?;
    let to = self.position(target)?;

    if from == to {
      return Ok(Vec::new());
    }
    if from > to {
      return Err(Error::InvalidDirection {
        from: source.clone(),
        to:   target.clone(),
      });
    }

    let versions = &self.inventory.versions()[from..=to];
    let models = self.inventory.models(versions)?;

    Ok(
      versions
        .windows(2)
        .zip(models.windows(2))
        .map(|(v, m)| MigrationStep {
          source_version: v[0].clone(),
          target_version: v[1].clone(),
          source_model:   Arc::clone(&m[0]),
          target_model:   Arc::clone(&m[1]),
        })
        .collect(),
    )
  }

  /// Like [`plan`](Self::plan), but empty when `oracle` says the target model
  /// can already open a store described by `metadata`.
  pub fn plan_for_store(
    &self,
    source: &SchemaVersion,
    target: &SchemaVersion,
    metadata: &StoreMetadata,
    oracle: &dyn CompatibilityOracle,
  ) -> Result<Vec<MigrationStep>> {
    self.position(source)?;
    let target_model = self
      .inventory
      .model(target)
      .ok_or_else(|| Error::UnknownVersion(target.name().to_owned()))?;

    if oracle.is_compatible(target_model, metadata) {
      return Ok(Vec::new());
    }
    self.plan(source, target)
  }

  fn position(&self, version: &SchemaVersion) -> Result<usize> {
    self
      .inventory
      .position(version)
      .ok_or_else(|| Error::UnknownVersion(version.name().to_owned()))
  }
}

#[cfg(test)]
mod tests {
  use crate::{
    metadata::StorageType,
    oracle::StructuralHashOracle,
    schema::{Attribute, AttributeKind, Entity},
  };

  use super::*;

  fn inventory() -> SchemaInventory {
    let names = ["Model 1", "Model 2", "Model 3", "Model 10"];
    SchemaInventory::from_parts(
      "unused",
      SchemaVersion::from("Model 10"),
      names.iter().map(|name| {
        let model = SchemaModel::new(vec![Entity::new("Person", vec![
          Attribute::new("name", AttributeKind::Text),
        ])])
        .with_hash_modifier(*name)
        .with_version_identifier(*name);
        (SchemaVersion::from(*name), model)
      }),
    )
    .unwrap()
  }

  fn pairs(steps: &[MigrationStep]) -> Vec<(String, String)> {
    steps
      .iter()
      .map(|s| (s.source_version.to_string(), s.target_version.to_string()))
      .collect()
  }

  #[test]
  fn plans_one_step_per_adjacent_pair() {
    let inventory = inventory();
    let planner = MigrationPlanner::new(&inventory);

    let steps = planner
      .plan(&"Model 1".into(), &"Model 10".into())
      .unwrap();

    assert_eq!(pairs(&steps), [
      ("Model 1".to_owned(), "Model 2".to_owned()),
      ("Model 2".to_owned(), "Model 3".to_owned()),
      ("Model 3".to_owned(), "Model 10".to_owned()),
    ]);
    assert!(steps[0].target_model.version_identifiers.contains("Model 2"));
    assert!(steps[2].target_model.version_identifiers.contains("Model 10"));
  }

  #[test]
  fn partial_ranges_stop_at_the_target() {
    let inventory = inventory();
    let steps = MigrationPlanner::new(&inventory)
      .plan(&"Model 2".into(), &"Model 3".into())
      .unwrap();
    assert_eq!(pairs(&steps), [("Model 2".to_owned(), "Model 3".to_owned())]);
  }

  #[test]
  fn same_version_needs_no_steps() {
    let inventory = inventory();
    let steps = MigrationPlanner::new(&inventory)
      .plan(&"Model 3".into(), &"Model 3".into())
      .unwrap();
    assert!(steps.is_empty());
  }

  #[test]
  fn backwards_plans_are_rejected() {
    let inventory = inventory();
    let result = MigrationPlanner::new(&inventory)
      .plan(&"Model 10".into(), &"Model 2".into());
    assert!(matches!(result, Err(Error::InvalidDirection { .. })));
  }

  #[test]
  fn unknown_versions_are_rejected() {
    let inventory = inventory();
    let planner = MigrationPlanner::new(&inventory);

    let unknown_source = planner.plan(&"Model 0".into(), &"Model 3".into());
    assert!(matches!(unknown_source, Err(Error::UnknownVersion(n)) if n == "Model 0"));

    let unknown_target = planner.plan(&"Model 1".into(), &"Model 4".into());
    assert!(matches!(unknown_target, Err(Error::UnknownVersion(n)) if n == "Model 4"));
  }

  #[test]
  fn compatible_stores_need_no_steps() {
    let inventory = inventory();
    let planner = MigrationPlanner::new(&inventory);
    let target = SchemaVersion::from("Model 3");
    let metadata = StoreMetadata::for_model(
      StorageType::Sqlite,
      inventory.model(&target).unwrap(),
    );

    let steps = planner
      .plan_for_store(&"Model 1".into(), &target, &metadata, &StructuralHashOracle)
      .unwrap();
    assert!(steps.is_empty());

    let stale = StoreMetadata::for_model(
      StorageType::Sqlite,
      inventory.model(&"Model 1".into()).unwrap(),
    );
    let steps = planner
      .plan_for_store(&"Model 1".into(), &target, &stale, &StructuralHashOracle)
      .unwrap();
    assert_eq!(steps.len(), 2);
  }
}
