//! Error types for `ladder-core`.

use std::{collections::BTreeSet, path::PathBuf};

use thiserror::Error;

use crate::{metadata::StorageType, schema::AttributeKind, version::SchemaVersion};

/// A boxed error from a store engine or another collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ─── Migration errors ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum Error {
  /// Nothing exists at the store location. Callers treat this as "nothing to
  /// migrate yet" rather than a failure.
  #[error("no store exists at {0}")]
  MissingStore(PathBuf),

  #[error("storage type mismatch: expected {expected}, found {found}")]
  StorageTypeMismatch {
    expected: StorageType,
    found:    StorageType,
  },

  #[error("failed to read store metadata at {path}: {cause}")]
  Metadata {
    path:  PathBuf,
    #[source]
    cause: BoxError,
  },

  #[error("store metadata does not name exactly one known version: {identifiers:?}")]
  AmbiguousOrMissingVersion { identifiers: BTreeSet<String> },

  #[error("unable to find a source model for version identifiers {identifiers:?}")]
  UnableToFindSourceModel { identifiers: BTreeSet<String> },

  #[error("unknown schema version: {0}")]
  UnknownVersion(String),

  #[error("cannot migrate backwards from {from} to {to}")]
  InvalidDirection { from: SchemaVersion, to: SchemaVersion },

  #[error("no mapping available from {from} to {to}: {reason}")]
  NoMappingAvailable {
    from:   SchemaVersion,
    to:     SchemaVersion,
    #[source]
    reason: InferenceError,
  },

  #[error("migration step from {from} to {to} failed: {cause}")]
  StepExecutionFailed {
    from:  SchemaVersion,
    to:    SchemaVersion,
    #[source]
    cause: BoxError,
  },

  #[error("failed to replace store at {path}: {cause}")]
  ReplaceFailed {
    path:  PathBuf,
    #[source]
    cause: BoxError,
  },

  #[error("introspection error: {0}")]
  Introspection(#[from] IntrospectionError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Inventory introspection ─────────────────────────────────────────────────

/// Why a schema package could not be turned into an inventory.
#[derive(Debug, Error)]
pub enum IntrospectionError {
  #[error("cannot find schema package {name:?} in {search_dir}")]
  CannotFindPackage { name: String, search_dir: PathBuf },

  #[error("failed to load the current model of package {path}: {source}")]
  FailedToLoadCurrentModel { path: PathBuf, source: SchemaError },

  #[error("failed to load version info file {path}: {source}")]
  FailedToLoadVersionInfoFile {
    path:   PathBuf,
    source: std::io::Error,
  },

  #[error("failed to load version hashes from {path}: {source}")]
  FailedToLoadVersionHashes {
    path:   PathBuf,
    source: serde_json::Error,
  },

  #[error("invalid version name {0:?}")]
  InvalidVersionName(String),

  #[error("failed to load the model for version {name}: {source}")]
  FailedToLoadVersionModel { name: String, source: SchemaError },

  #[error("model for version {name} hashes to {actual}, manifest says {expected}")]
  VersionHashMismatch {
    name:     String,
    expected: String,
    actual:   String,
  },

  #[error("version {0} is listed more than once")]
  DuplicateVersion(String),

  #[error("no version matches the package's primary model")]
  CurrentVersionNotFound,

  #[error("current version {current} is older than {newest}")]
  CurrentVersionNotNewest {
    current: SchemaVersion,
    newest:  SchemaVersion,
  },

  #[error("failed to load mapping {path}: {source}")]
  FailedToLoadMapping { path: PathBuf, source: SchemaError },
}

// ─── Schema definitions ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SchemaError {
  #[error("failed to read {path}: {source}")]
  Io {
    path:   PathBuf,
    source: std::io::Error,
  },

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("entity and attribute names must not be empty")]
  EmptyName,

  #[error("duplicate entity {0}")]
  DuplicateEntity(String),

  #[error("duplicate attribute {attribute} in entity {entity}")]
  DuplicateAttribute { entity: String, attribute: String },

  #[error("entity {entity} uses the reserved attribute name {attribute:?}")]
  ReservedAttribute { entity: String, attribute: String },

  #[error("default for {entity}.{attribute} is not a valid {kind} value")]
  InvalidDefault {
    entity:    String,
    attribute: String,
    kind:      AttributeKind,
  },
}

// ─── Mapping inference and evaluation ────────────────────────────────────────

/// Why a structural mapping could not be inferred between two schemas.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
  #[error("{entity}.{attribute} changed kind from {from} to {to}")]
  KindChanged {
    entity:    String,
    attribute: String,
    from:      AttributeKind,
    to:        AttributeKind,
  },

  #[error("{entity}.{attribute} became required without a default value")]
  BecameRequired { entity: String, attribute: String },

  #[error("new required attribute {entity}.{attribute} has no default value")]
  MissingValue { entity: String, attribute: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
  #[error("mapping for {entity} reads missing source attribute {attribute}")]
  MissingSourceAttribute { entity: String, attribute: String },
}
