//! Error type for `ladder-store-sqlite`.

use std::path::PathBuf;

use ladder_core::{
  error::{MappingError, SchemaError},
  schema::AttributeKind,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("schema error: {0}")]
  Schema(#[from] SchemaError),

  #[error("mapping error: {0}")]
  Mapping(#[from] MappingError),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("no store exists at {0}")]
  MissingStore(PathBuf),

  /// The file is an SQLite database, but not one written by this engine.
  #[error("store has no metadata table")]
  MissingMetadataTable,

  #[error("store metadata has no {0:?} entry")]
  MissingMetadata(&'static str),

  #[error("store metadata entry {key:?} is invalid: {reason}")]
  InvalidMetadata { key: &'static str, reason: String },

  #[error("store was saved with model {found}, expected {expected}")]
  IncompatibleModel { expected: String, found: String },

  #[error("destination {0} already exists")]
  DestinationExists(PathBuf),

  #[error("entity name {0:?} is reserved")]
  ReservedEntity(String),

  #[error("unknown entity {0}")]
  UnknownEntity(String),

  #[error("unknown attribute {entity}.{attribute}")]
  UnknownAttribute { entity: String, attribute: String },

  #[error("required attribute {entity}.{attribute} has no value")]
  MissingValue { entity: String, attribute: String },

  #[error("value of {entity}.{attribute} is not a valid {kind}")]
  InvalidValue {
    entity:    String,
    attribute: String,
    kind:      AttributeKind,
  },

  #[error("backup did not complete: {0}")]
  ReplaceIncomplete(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
