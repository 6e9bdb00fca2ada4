//! [`SqliteStore`] — a store file opened with the model it was saved with.

use std::{collections::HashMap, ffi::OsString, fs, io, path::Path};

use chrono::{DateTime, Utc};
use ladder_core::{
  mapping::{Mapping, Record},
  metadata::{StorageType, StoreMetadata},
  schema::{Entity, RESERVED_ATTRIBUTE, SchemaModel},
};
use rusqlite::{Connection, OpenFlags, types::Value as SqlValue};
use serde_json::Value;

use crate::{
  Error, Result,
  encode::{decode_dt, decode_value, encode_dt, encode_value},
  schema::{
    METADATA_SCHEMA, METADATA_TABLE, SAVED_AT_KEY, STORAGE_TYPE_KEY,
    STRUCTURAL_HASH_KEY, VERSION_IDENTIFIERS_KEY, create_table_sql,
    quote_identifier,
  },
};

/// Files SQLite may keep next to a database.
const SIDE_FILE_SUFFIXES: [&str; 3] = ["-journal", "-wal", "-shm"];

/// What the metadata table of a store records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreInfo {
  pub metadata: StoreMetadata,
  /// When the store was created or last migrated.
  pub saved_at: Option<DateTime<Utc>>,
}

// ─── Store ───────────────────────────────────────────────────────────────────

pub struct SqliteStore {
  conn:  Connection,
  model: SchemaModel,
}

impl SqliteStore {
  /// Create a new, empty store at `path` saved with `model`.
  pub fn create(path: impl AsRef<Path>, model: &SchemaModel) -> Result<Self> {
    let path = path.as_ref();
    if path.exists() {
      return Err(Error::DestinationExists(path.to_owned()));
    }
    model.validate()?;
    if let Some(entity) = model
      .entities
      .iter()
      .find(|e| e.name.eq_ignore_ascii_case(METADATA_TABLE))
    {
      return Err(Error::ReservedEntity(entity.name.clone()));
    }

    // A store that could not be fully created is removed again, so the path
    // stays free for a retry.
    let conn = match initialize(Connection::open(path)?, model) {
      Ok(conn) => conn,
      Err(e) => {
        if let Err(cleanup) = remove_store_files(path) {
          tracing::warn!(
            path = %path.display(),
            error = %cleanup,
            "failed to remove partially created store"
          );
        }
        return Err(e);
      }
    };

    tracing::debug!(
      path = %path.display(),
      hash = %model.structural_hash(),
      "created store"
    );
    Ok(Self { conn, model: model.clone() })
  }

  /// Open the existing store at `path`, which must have been saved with a
  /// model structurally identical to `model`.
  pub fn open(path: impl AsRef<Path>, model: SchemaModel) -> Result<Self> {
    let path = path.as_ref();
    if !path.is_file() {
      return Err(Error::MissingStore(path.to_owned()));
    }
    let conn = Connection::open_with_flags(
      path,
      OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;

    let found = read_info(&conn)?.metadata.structural_hash;
    let expected = model.structural_hash();
    if found != expected {
      return Err(Error::IncompatibleModel { expected, found });
    }
    Ok(Self { conn, model })
  }

  pub fn model(&self) -> &SchemaModel { &self.model }

  pub fn info(&self) -> Result<StoreInfo> { read_info(&self.conn) }

  pub fn metadata(&self) -> Result<StoreMetadata> { Ok(self.info()?.metadata) }

  /// Insert a record and return its row id.
  ///
  /// Absent attributes take their default; a required attribute left without
  /// a value is an error.
  pub fn insert(&self, entity: &str, record: &Record) -> Result<i64> {
    insert_row(&self.conn, self.entity(entity)?, None, record)
  }

  /// Every record of `entity` in row id order, nulls included.
  pub fn records(&self, entity: &str) -> Result<Vec<Record>> {
    Ok(self.rows(entity)?.into_iter().map(|(_, r)| r).collect())
  }

  /// Like [`records`](Self::records), paired with each row id.
  pub fn rows(&self, entity: &str) -> Result<Vec<(i64, Record)>> {
    read_rows(&self.conn, self.entity(entity)?)
  }

  pub fn count(&self, entity: &str) -> Result<usize> {
    let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(&self.entity(entity)?.name));
    let count: i64 = self.conn.query_row(&sql, [], |r| r.get(0))?;
    Ok(usize::try_from(count).unwrap_or_default())
  }

  /// Fill this store from `source`, saved with `source_model`, through
  /// `mapping`. All rows are written in one transaction.
  pub(crate) fn import(
    &mut self,
    source: &Connection,
    source_model: &SchemaModel,
    mapping: &Mapping,
  ) -> Result<()> {
    let tx = self.conn.transaction()?;

    for entity_mapping in &mapping.entities {
      let target = self
        .model
        .entity(&entity_mapping.target_entity)
        .ok_or_else(|| Error::UnknownEntity(entity_mapping.target_entity.clone()))?;

      let mut copied = 0;
      if let Some(source_name) = &entity_mapping.source_entity {
        let source_entity = source_model
          .entity(source_name)
          .ok_or_else(|| Error::UnknownEntity(source_name.clone()))?;
        for (pk, row) in read_rows(source, source_entity)? {
          let record = entity_mapping.transform(&row)?;
          insert_row(&tx, target, Some(pk), &record)?;
          copied += 1;
        }
      }
      for record in &entity_mapping.seed {
        insert_row(&tx, target, None, record)?;
      }

      tracing::trace!(
        entity = %target.name,
        copied,
        seeded = entity_mapping.seed.len(),
        "imported entity"
      );
    }

    tx.commit()?;
    Ok(())
  }

  fn entity(&self, name: &str) -> Result<&Entity> {
    self
      .model
      .entity(name)
      .ok_or_else(|| Error::UnknownEntity(name.to_owned()))
  }
}

/// Write the metadata and entity tables of a new store in one transaction.
fn initialize(mut conn: Connection, model: &SchemaModel) -> Result<Connection> {
  let tx = conn.transaction()?;
  tx.execute_batch(METADATA_SCHEMA)?;
  for entity in &model.entities {
    tx.execute_batch(&create_table_sql(entity))?;
  }
  write_metadata(&tx, model)?;
  tx.commit()?;
  Ok(conn)
}

// ─── Rows ────────────────────────────────────────────────────────────────────

fn insert_row(
  conn: &Connection,
  entity: &Entity,
  pk: Option<i64>,
  record: &Record,
) -> Result<i64> {
  if let Some(unknown) = record.keys().find(|k| entity.attribute(k).is_none()) {
    return Err(Error::UnknownAttribute {
      entity:    entity.name.clone(),
      attribute: unknown.clone(),
    });
  }

  let mut columns = Vec::with_capacity(entity.attributes.len() + 1);
  let mut values = Vec::with_capacity(entity.attributes.len() + 1);
  if let Some(pk) = pk {
    columns.push(quote_identifier(RESERVED_ATTRIBUTE));
    values.push(SqlValue::Integer(pk));
  }

  for attribute in &entity.attributes {
    let value = match record.get(&attribute.name) {
      Some(value) => value,
      None => attribute.default.as_ref().unwrap_or(&Value::Null),
    };
    if value.is_null() && !attribute.optional {
      return Err(Error::MissingValue {
        entity:    entity.name.clone(),
        attribute: attribute.name.clone(),
      });
    }
    let encoded =
      encode_value(attribute.kind, value).ok_or_else(|| Error::InvalidValue {
        entity:    entity.name.clone(),
        attribute: attribute.name.clone(),
        kind:      attribute.kind,
      })?;
    columns.push(quote_identifier(&attribute.name));
    values.push(encoded);
  }

  let table = quote_identifier(&entity.name);
  let sql = if columns.is_empty() {
    format!("INSERT INTO {table} DEFAULT VALUES")
  } else {
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
      "INSERT INTO {table} ({}) VALUES ({placeholders})",
      columns.join(", ")
    )
  };
  conn.execute(&sql, rusqlite::params_from_iter(values))?;
  Ok(conn.last_insert_rowid())
}

fn read_rows(conn: &Connection, entity: &Entity) -> Result<Vec<(i64, Record)>> {
  let pk = quote_identifier(RESERVED_ATTRIBUTE);
  let columns: Vec<String> = std::iter::once(pk.clone())
    .chain(entity.attributes.iter().map(|a| quote_identifier(&a.name)))
    .collect();
  let sql = format!(
    "SELECT {} FROM {} ORDER BY {pk}",
    columns.join(", "),
    quote_identifier(&entity.name)
  );

  let mut stmt = conn.prepare(&sql)?;
  let mut rows = stmt.query([])?;
  let mut out = Vec::new();
  while let Some(row) = rows.next()? {
    let id: i64 = row.get(0)?;
    let mut record = Record::new();
    for (i, attribute) in entity.attributes.iter().enumerate() {
      let raw: SqlValue = row.get(i + 1)?;
      let value = decode_value(attribute.kind, raw).ok_or_else(|| {
        Error::InvalidValue {
          entity:    entity.name.clone(),
          attribute: attribute.name.clone(),
          kind:      attribute.kind,
        }
      })?;
      record.insert(attribute.name.clone(), value);
    }
    out.push((id, record));
  }
  Ok(out)
}

// ─── Metadata ────────────────────────────────────────────────────────────────

fn write_metadata(conn: &Connection, model: &SchemaModel) -> Result<()> {
  let entries = [
    (STORAGE_TYPE_KEY, StorageType::Sqlite.to_string()),
    (
      VERSION_IDENTIFIERS_KEY,
      serde_json::to_string(&model.version_identifiers)?,
    ),
    (STRUCTURAL_HASH_KEY, model.structural_hash()),
    (SAVED_AT_KEY, encode_dt(Utc::now())),
  ];
  for (key, value) in entries {
    conn.execute(
      "INSERT OR REPLACE INTO ladder_metadata (key, value) VALUES (?1, ?2)",
      rusqlite::params![key, value],
    )?;
  }
  Ok(())
}

/// Remove the store file at `path` and any journal SQLite left next to it.
pub(crate) fn remove_store_files(path: &Path) -> Result<()> {
  remove_if_exists(path)?;
  for suffix in SIDE_FILE_SUFFIXES {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    remove_if_exists(Path::new(&name))?;
  }
  Ok(())
}

fn remove_if_exists(path: &Path) -> Result<()> {
  match fs::remove_file(path) {
    Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
    _ => Ok(()),
  }
}

/// Open `path` read-only. The file must already exist.
pub(crate) fn open_read_only(path: &Path) -> Result<Connection> {
  Ok(Connection::open_with_flags(
    path,
    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
  )?)
}

pub(crate) fn read_info(conn: &Connection) -> Result<StoreInfo> {
  let has_table: bool = conn.query_row(
    "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
    [METADATA_TABLE],
    |r| r.get(0),
  )?;
  if !has_table {
    return Err(Error::MissingMetadataTable);
  }

  let mut stmt = conn.prepare("SELECT key, value FROM ladder_metadata")?;
  let entries: HashMap<String, String> = stmt
    .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
    .collect::<rusqlite::Result<_>>()?;
  let get = |key: &'static str| {
    entries
      .get(key)
      .map(String::as_str)
      .ok_or(Error::MissingMetadata(key))
  };

  let storage_type = get(STORAGE_TYPE_KEY)?.parse::<StorageType>().map_err(|e| {
    Error::InvalidMetadata { key: STORAGE_TYPE_KEY, reason: e.to_string() }
  })?;
  let version_identifiers = serde_json::from_str(get(VERSION_IDENTIFIERS_KEY)?)
    .map_err(|e| Error::InvalidMetadata {
      key:    VERSION_IDENTIFIERS_KEY,
      reason: e.to_string(),
    })?;
  let structural_hash = get(STRUCTURAL_HASH_KEY)?.to_owned();
  let saved_at = entries
    .get(SAVED_AT_KEY)
    .map(|s| decode_dt(s))
    .transpose()?;

  Ok(StoreInfo {
    metadata: StoreMetadata {
      storage_type,
      version_identifiers,
      structural_hash,
    },
    saved_at,
  })
}

/// Read the metadata of the store at `path` without opening it for writing.
pub fn read_store_info(path: impl AsRef<Path>) -> Result<StoreInfo> {
  let path = path.as_ref();
  if !path.is_file() {
    return Err(Error::MissingStore(path.to_owned()));
  }
  read_info(&open_read_only(path)?)
}
