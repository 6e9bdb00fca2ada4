//! Mappings: the concrete transform executed for one migration step.
//!
//! A mapping describes, for each entity of the target model, where its rows
//! come from and how each attribute is computed. Mappings are either written
//! by hand and shipped in the schema package, or inferred structurally.

use std::{
  collections::{BTreeMap, HashMap},
  fs,
  path::Path,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
  error::{IntrospectionError, MappingError, SchemaError},
  inventory::MAPPINGS_DIR,
  version::SchemaVersion,
};

/// One row of an entity, keyed by attribute name.
pub type Record = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingOrigin {
  #[default]
  Authored,
  Inferred,
}

/// How one target attribute is computed from a source row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ValueExpression {
  /// Copy the named source attribute.
  Source(String),
  /// Copy the named source attribute, substituting `default` for null.
  SourceOrDefault { attribute: String, default: Value },
  Constant(Value),
  Null,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeMapping {
  pub target: String,
  pub value:  ValueExpression,
}

/// How the rows of one target entity are produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMapping {
  pub target_entity: String,
  /// Entity whose rows are carried over; `None` for a new collection.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source_entity: Option<String>,
  #[serde(default)]
  pub attributes:    Vec<AttributeMapping>,
  /// Rows inserted into the target entity after any carried-over rows.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub seed:          Vec<Record>,
}

impl EntityMapping {
  /// Compute a target row from `row`, a row of the source entity.
  ///
  /// Attributes without a mapping are left out, so the engine applies the
  /// target model's defaults to them.
  pub fn transform(&self, row: &Record) -> Result<Record, MappingError> {
    let read = |attribute: &str| {
      row.get(attribute).cloned().ok_or_else(|| {
        MappingError::MissingSourceAttribute {
          entity:    self
            .source_entity
            .clone()
            .unwrap_or_else(|| self.target_entity.clone()),
          attribute: attribute.to_owned(),
        }
      })
    };

    self
      .attributes
      .iter()
      .map(|mapping| -> Result<(String, Value), MappingError> {
        let value = match &mapping.value {
          ValueExpression::Source(attribute) => read(attribute)?,
          ValueExpression::SourceOrDefault { attribute, default } => {
            match read(attribute)? {
              Value::Null => default.clone(),
              value => value,
            }
          }
          ValueExpression::Constant(value) => value.clone(),
          ValueExpression::Null => Value::Null,
        };
        Ok((mapping.target.clone(), value))
      })
      .collect()
  }
}

/// The transform for one step, from `source_version` to `target_version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
  #[serde(default)]
  pub origin:         MappingOrigin,
  pub source_version: SchemaVersion,
  pub target_version: SchemaVersion,
  pub entities:       Vec<EntityMapping>,
}

impl Mapping {
  pub fn entity(&self, target_entity: &str) -> Option<&EntityMapping> {
    self.entities.iter().find(|e| e.target_entity == target_entity)
  }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// Hand-written mappings, keyed by source and target version.
#[derive(Debug, Clone, Default)]
pub struct MappingCatalog {
  mappings: HashMap<(SchemaVersion, SchemaVersion), Mapping>,
}

impl MappingCatalog {
  pub fn new() -> Self { Self::default() }

  /// Load every `mappings/*.json` file of the package at `package_path`.
  /// A package without a `mappings` directory has no authored mappings.
  pub fn from_package_path(
    package_path: impl AsRef<Path>,
  ) -> Result<Self, IntrospectionError> {
    let dir = package_path.as_ref().join(MAPPINGS_DIR);
    let mut catalog = Self::new();
    if !dir.is_dir() {
      return Ok(catalog);
    }

    let entries = fs::read_dir(&dir).map_err(|source| {
      IntrospectionError::FailedToLoadMapping {
        path:   dir.clone(),
        source: SchemaError::Io { path: dir.clone(), source },
      }
    })?;

    let mut paths = Vec::new();
    for entry in entries {
      let path = entry
        .map_err(|source| IntrospectionError::FailedToLoadMapping {
          path:   dir.clone(),
          source: SchemaError::Io { path: dir.clone(), source },
        })?
        .path();
      if path.extension().is_some_and(|ext| ext == "json") {
        paths.push(path);
      }
    }
    paths.sort();

    for path in paths {
      let mapping = load_mapping(&path).map_err(|source| {
        IntrospectionError::FailedToLoadMapping { path: path.clone(), source }
      })?;
      tracing::debug!(
        path = %path.display(),
        from = %mapping.source_version,
        to = %mapping.target_version,
        "loaded authored mapping"
      );
      catalog.insert(mapping);
    }

    Ok(catalog)
  }

  /// Add a mapping, replacing any previous one for the same pair of versions.
  pub fn insert(&mut self, mut mapping: Mapping) -> Option<Mapping> {
    mapping.origin = MappingOrigin::Authored;
    let key = (mapping.source_version.clone(), mapping.target_version.clone());
    self.mappings.insert(key, mapping)
  }

  pub fn with(mut self, mapping: Mapping) -> Self {
    self.insert(mapping);
    self
  }

  pub fn authored(
    &self,
    source: &SchemaVersion,
    target: &SchemaVersion,
  ) -> Option<&Mapping> {
    self.mappings.get(&(source.clone(), target.clone()))
  }

  pub fn len(&self) -> usize { self.mappings.len() }

  pub fn is_empty(&self) -> bool { self.mappings.is_empty() }
}

fn load_mapping(path: &Path) -> Result<Mapping, SchemaError> {
  let json = fs::read_to_string(path).map_err(|source| SchemaError::Io {
    path: path.to_owned(),
    source,
  })?;
  Ok(serde_json::from_str(&json)?)
}
