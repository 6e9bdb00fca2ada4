//! End-to-end tests for `SqliteStore` and `SqliteEngine` on scratch files.

use std::{fs, path::PathBuf};

use ladder_core::{
  Error as CoreError, IterativeMigrator, MigrationOutcome, SchemaInventory,
  SchemaVersion,
  engine::StoreEngine,
  mapping::{
    AttributeMapping, EntityMapping, Mapping, MappingCatalog, MappingOrigin,
    Record, ValueExpression,
  },
  metadata::StorageType,
  planner::MigrationPlanner,
  schema::{Attribute, AttributeKind, Entity, SchemaModel},
};
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::{Error, SqliteEngine, SqliteStore, read_store_info};

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn model_1() -> SchemaModel {
  SchemaModel::new(vec![Entity::new("Person", vec![Attribute::new(
    "name",
    AttributeKind::Text,
  )])])
}

fn model_2() -> SchemaModel {
  SchemaModel::new(vec![Entity::new("Person", vec![
    Attribute::new("name", AttributeKind::Text),
    Attribute::new("nickname", AttributeKind::Text).optional(),
    Attribute::new("starred", AttributeKind::Boolean).with_default(false),
  ])])
}

fn model_3() -> SchemaModel {
  let mut model = model_2();
  model.entities.push(Entity::new("Group", vec![Attribute::new(
    "title",
    AttributeKind::Text,
  )]));
  model
}

fn contacts() -> SchemaInventory {
  SchemaInventory::from_parts(
    "Contacts.schemapkg",
    SchemaVersion::from("Model 3"),
    [("Model 1", model_1()), ("Model 2", model_2()), ("Model 3", model_3())]
      .map(|(name, model)| (SchemaVersion::from(name), model.with_version_identifier(name))),
  )
  .unwrap()
}

fn copy(attribute: &str) -> AttributeMapping {
  AttributeMapping {
    target: attribute.into(),
    value:  ValueExpression::Source(attribute.into()),
  }
}

/// Model 2 to Model 3, seeding a "Favorites" group.
fn favorites_mapping() -> Mapping {
  Mapping {
    origin:         MappingOrigin::Authored,
    source_version: "Model 2".into(),
    target_version: "Model 3".into(),
    entities:       vec![
      EntityMapping {
        target_entity: "Person".into(),
        source_entity: Some("Person".into()),
        attributes:    vec![copy("name"), copy("nickname"), copy("starred")],
        seed:          vec![],
      },
      EntityMapping {
        target_entity: "Group".into(),
        source_entity: None,
        attributes:    vec![],
        seed:          vec![record(&[("title", json!("Favorites"))])],
      },
    ],
  }
}

fn record(pairs: &[(&str, Value)]) -> Record {
  pairs
    .iter()
    .map(|(k, v)| ((*k).to_owned(), v.clone()))
    .collect()
}

struct Scratch {
  _dir:     TempDir,
  store:    PathBuf,
  temp_dir: PathBuf,
}

impl Scratch {
  fn new() -> Self {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("Contacts.sqlite");
    let temp_dir = dir.path().join("tmp");
    fs::create_dir(&temp_dir).unwrap();
    Self { _dir: dir, store, temp_dir }
  }

  /// A store saved with `version`, holding one person per name.
  fn seed(&self, inventory: &SchemaInventory, version: &str, people: &[&str]) {
    let model = inventory.model(&version.into()).unwrap();
    let store = SqliteStore::create(&self.store, model).unwrap();
    for name in people {
      store.insert("Person", &record(&[("name", json!(name))])).unwrap();
    }
  }

  fn bytes(&self) -> Vec<u8> { fs::read(&self.store).unwrap() }

  fn leftovers(&self) -> usize { fs::read_dir(&self.temp_dir).unwrap().count() }

  fn migrator<'a>(
    &self,
    engine: &'a SqliteEngine,
    inventory: &'a SchemaInventory,
  ) -> IterativeMigrator<'a, SqliteEngine> {
    IterativeMigrator::new(engine, inventory).with_temp_dir(&self.temp_dir)
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

#[test]
fn created_stores_record_their_model() {
  let scratch = Scratch::new();
  let inventory = contacts();
  scratch.seed(&inventory, "Model 2", &[]);

  let info = read_store_info(&scratch.store).unwrap();
  assert_eq!(info.metadata.storage_type, StorageType::Sqlite);
  assert!(info.metadata.version_identifiers.contains("Model 2"));
  assert_eq!(info.metadata.structural_hash, model_2().structural_hash());
  assert!(info.saved_at.is_some());

  assert_eq!(SqliteEngine.read_metadata(&scratch.store).unwrap(), info.metadata);
}

#[test]
fn create_refuses_existing_files() {
  let scratch = Scratch::new();
  fs::write(&scratch.store, "").unwrap();

  let result = SqliteStore::create(&scratch.store, &model_1());
  assert!(matches!(result, Err(Error::DestinationExists(_))));
}

#[test]
fn create_rejects_names_sqlite_would_fold_together() {
  let scratch = Scratch::new();

  let mut doubled = model_1();
  doubled.entities.push(Entity::new("person", vec![]));
  let result = SqliteStore::create(&scratch.store, &doubled);
  assert!(matches!(result, Err(Error::Schema(_))));
  assert!(!scratch.store.exists());

  let reserved = SchemaModel::new(vec![Entity::new("LADDER_METADATA", vec![])]);
  let result = SqliteStore::create(&scratch.store, &reserved);
  assert!(matches!(result, Err(Error::ReservedEntity(_))));
  assert!(!scratch.store.exists());
}

#[test]
fn failed_creates_leave_the_path_free() {
  let scratch = Scratch::new();

  // SQLite refuses table names in its own namespace once the file is open.
  let internal = SchemaModel::new(vec![Entity::new("sqlite_people", vec![])]);
  let result = SqliteStore::create(&scratch.store, &internal);
  assert!(matches!(result, Err(Error::Database(_))));
  assert!(!scratch.store.exists());
  assert_eq!(fs::read_dir(scratch.store.parent().unwrap()).unwrap().count(), 1);

  SqliteStore::create(&scratch.store, &model_1()).unwrap();
  assert!(read_store_info(&scratch.store).is_ok());
}

#[test]
fn inserts_apply_defaults_and_check_values() {
  let scratch = Scratch::new();
  let store = SqliteStore::create(&scratch.store, &model_2()).unwrap();

  let pk = store
    .insert("Person", &record(&[("name", json!("Alice"))]))
    .unwrap();
  assert_eq!(store.rows("Person").unwrap(), [(
    pk,
    record(&[
      ("name", json!("Alice")),
      ("nickname", Value::Null),
      ("starred", json!(false)),
    ])
  )]);

  assert!(matches!(
    store.insert("Person", &record(&[("nickname", json!("Al"))])),
    Err(Error::MissingValue { attribute, .. }) if attribute == "name"
  ));
  assert!(matches!(
    store.insert("Person", &record(&[("name", json!(5))])),
    Err(Error::InvalidValue { kind: AttributeKind::Text, .. })
  ));
  assert!(matches!(
    store.insert("Person", &record(&[("name", json!("Bob")), ("age", json!(3))])),
    Err(Error::UnknownAttribute { attribute, .. }) if attribute == "age"
  ));
  assert!(matches!(
    store.insert("Group", &record(&[])),
    Err(Error::UnknownEntity(name)) if name == "Group"
  ));
  assert_eq!(store.count("Person").unwrap(), 1);
}

#[test]
fn every_kind_reads_back_unchanged() {
  let scratch = Scratch::new();
  let model = SchemaModel::new(vec![Entity::new("Sample", vec![
    Attribute::new("text", AttributeKind::Text),
    Attribute::new("integer", AttributeKind::Integer),
    Attribute::new("real", AttributeKind::Real),
    Attribute::new("boolean", AttributeKind::Boolean),
    Attribute::new("blob", AttributeKind::Blob),
  ])]);
  let store = SqliteStore::create(&scratch.store, &model).unwrap();

  let sample = record(&[
    ("text", json!("hello")),
    ("integer", json!(-42)),
    ("real", json!(2.5)),
    ("boolean", json!(true)),
    ("blob", json!("cafe")),
  ]);
  store.insert("Sample", &sample).unwrap();

  assert_eq!(store.records("Sample").unwrap(), [sample]);
}

#[test]
fn foreign_databases_have_no_metadata() {
  let scratch = Scratch::new();
  rusqlite::Connection::open(&scratch.store)
    .unwrap()
    .execute_batch("CREATE TABLE other (id INTEGER PRIMARY KEY);")
    .unwrap();

  assert!(matches!(
    read_store_info(&scratch.store),
    Err(Error::MissingMetadataTable)
  ));
}

#[test]
fn open_requires_the_saved_model() {
  let scratch = Scratch::new();
  let inventory = contacts();
  scratch.seed(&inventory, "Model 1", &["Alice"]);

  assert!(matches!(
    SqliteStore::open(&scratch.store, model_2()),
    Err(Error::IncompatibleModel { .. })
  ));
  let store = SqliteStore::open(&scratch.store, model_1()).unwrap();
  assert_eq!(store.count("Person").unwrap(), 1);

  let missing = scratch.temp_dir.join("missing.sqlite");
  assert!(matches!(
    SqliteStore::open(&missing, model_1()),
    Err(Error::MissingStore(_))
  ));
}

// ─── Engine ──────────────────────────────────────────────────────────────────

#[test]
fn migrate_store_keeps_row_ids_and_the_source() {
  let scratch = Scratch::new();
  let inventory = contacts();
  scratch.seed(&inventory, "Model 2", &["Alice", "Bob"]);
  let before = scratch.bytes();

  let steps = MigrationPlanner::new(&inventory)
    .plan(&"Model 2".into(), &"Model 3".into())
    .unwrap();
  let destination = scratch.temp_dir.join("next.sqlite");
  SqliteEngine
    .migrate_store(&scratch.store, &steps[0], &favorites_mapping(), &destination)
    .unwrap();

  assert_eq!(scratch.bytes(), before);
  let migrated = SqliteStore::open(&destination, model_3()).unwrap();
  let ids: Vec<i64> = migrated
    .rows("Person")
    .unwrap()
    .into_iter()
    .map(|(pk, _)| pk)
    .collect();
  assert_eq!(ids, [1, 2]);
  assert_eq!(migrated.records("Group").unwrap(), [record(&[(
    "title",
    json!("Favorites")
  )])]);

  let again = SqliteEngine.migrate_store(
    &scratch.store,
    &steps[0],
    &favorites_mapping(),
    &destination,
  );
  assert!(matches!(again, Err(Error::DestinationExists(_))));
}

#[test]
fn replace_store_swaps_contents() {
  let scratch = Scratch::new();
  let inventory = contacts();
  scratch.seed(&inventory, "Model 1", &["Alice"]);

  let replacement = scratch.temp_dir.join("replacement.sqlite");
  let other = SqliteStore::create(&replacement, inventory.model(&"Model 2".into()).unwrap())
    .unwrap();
  other.insert("Person", &record(&[("name", json!("Bob"))])).unwrap();
  drop(other);

  SqliteEngine.replace_store(&scratch.store, &replacement).unwrap();

  let store = SqliteStore::open(&scratch.store, model_2()).unwrap();
  assert!(store.metadata().unwrap().version_identifiers.contains("Model 2"));
  assert_eq!(store.records("Person").unwrap()[0]["name"], json!("Bob"));
}

#[test]
fn destroy_store_removes_side_files() {
  let scratch = Scratch::new();
  let location = scratch.temp_dir.join("doomed.sqlite");
  for suffix in ["", "-journal", "-wal", "-shm"] {
    fs::write(format!("{}{suffix}", location.display()), "").unwrap();
  }

  SqliteEngine.destroy_store(&location).unwrap();
  assert_eq!(scratch.leftovers(), 0);

  SqliteEngine.destroy_store(&location).unwrap();
}

// ─── Migration ───────────────────────────────────────────────────────────────

#[test]
fn full_chain_infers_then_applies_authored_mappings() {
  let scratch = Scratch::new();
  let inventory = contacts();
  scratch.seed(&inventory, "Model 1", &["Alice", "Bob"]);

  let engine = SqliteEngine;
  let outcome = scratch
    .migrator(&engine, &inventory)
    .with_mappings(MappingCatalog::new().with(favorites_mapping()))
    .migrate_to_current(&scratch.store)
    .unwrap();

  let MigrationOutcome::Migrated(report) = outcome else {
    panic!("expected a migration, got {outcome:?}");
  };
  assert_eq!(report.steps.len(), 2);
  assert_eq!(scratch.leftovers(), 0);

  let store = SqliteStore::open(&scratch.store, model_3()).unwrap();
  assert!(store.metadata().unwrap().version_identifiers.contains("Model 3"));
  assert_eq!(store.rows("Person").unwrap(), [
    (
      1,
      record(&[
        ("name", json!("Alice")),
        ("nickname", Value::Null),
        ("starred", json!(false)),
      ])
    ),
    (
      2,
      record(&[
        ("name", json!("Bob")),
        ("nickname", Value::Null),
        ("starred", json!(false)),
      ])
    ),
  ]);
  assert_eq!(store.records("Group").unwrap(), [record(&[(
    "title",
    json!("Favorites")
  )])]);
}

#[test]
fn migrating_twice_is_a_no_op() {
  let scratch = Scratch::new();
  let inventory = contacts();
  scratch.seed(&inventory, "Model 1", &["Alice"]);
  let engine = SqliteEngine;

  let first = scratch
    .migrator(&engine, &inventory)
    .migrate_to_current(&scratch.store)
    .unwrap();
  assert!(first.is_migrated());
  let after_first = scratch.bytes();

  let second = scratch
    .migrator(&engine, &inventory)
    .migrate_to_current(&scratch.store)
    .unwrap();
  assert_eq!(second, MigrationOutcome::AlreadyCompatible);
  assert_eq!(scratch.bytes(), after_first);
}

#[test]
fn missing_stores_are_left_missing() {
  let scratch = Scratch::new();
  let inventory = contacts();
  let engine = SqliteEngine;

  let outcome = scratch
    .migrator(&engine, &inventory)
    .migrate_to_current(&scratch.store)
    .unwrap();

  assert_eq!(outcome, MigrationOutcome::MissingStore);
  assert!(!scratch.store.exists());
}

#[test]
fn failed_chains_leave_the_store_untouched() {
  let scratch = Scratch::new();
  let inventory = contacts();
  scratch.seed(&inventory, "Model 1", &["Alice"]);
  let before = scratch.bytes();

  let mut broken = favorites_mapping();
  broken.entities[0].attributes[0] = AttributeMapping {
    target: "name".into(),
    value:  ValueExpression::Source("full_name".into()),
  };

  let engine = SqliteEngine;
  let result = scratch
    .migrator(&engine, &inventory)
    .with_mappings(MappingCatalog::new().with(broken))
    .migrate_to_current(&scratch.store);

  assert!(matches!(
    result,
    Err(CoreError::StepExecutionFailed { from, .. }) if from.name() == "Model 2"
  ));
  assert_eq!(scratch.bytes(), before);
  assert_eq!(scratch.leftovers(), 0);
  let store = SqliteStore::open(&scratch.store, model_1()).unwrap();
  assert_eq!(store.records("Person").unwrap(), [record(&[("name", json!("Alice"))])]);
}

#[test]
fn unknown_targets_are_rejected() {
  let scratch = Scratch::new();
  let inventory = contacts();
  scratch.seed(&inventory, "Model 1", &["Alice"]);
  let before = scratch.bytes();
  let engine = SqliteEngine;

  let result = scratch
    .migrator(&engine, &inventory)
    .migrate(&scratch.store, &"Model 7".into());

  assert!(matches!(result, Err(CoreError::UnknownVersion(n)) if n == "Model 7"));
  assert_eq!(scratch.bytes(), before);
}
