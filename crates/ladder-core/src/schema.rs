//! Schema definitions: the structure a store is saved with.
//!
//! A [`SchemaModel`] is a set of entities (record collections), each with
//! typed attributes. Models are stored as JSON inside a schema package and
//! identified structurally by [`SchemaModel::structural_hash`].

use std::{
  collections::{BTreeSet, HashSet},
  fs,
  path::Path,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::SchemaError;

/// Attribute name reserved for the engine-assigned row identifier.
pub const RESERVED_ATTRIBUTE: &str = "pk";

// ─── Attributes ──────────────────────────────────────────────────────────────

/// The value type of an attribute.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttributeKind {
  Text,
  Integer,
  Real,
  Boolean,
  /// Binary data, carried in records as a lowercase hex string.
  Blob,
}

impl AttributeKind {
  /// Whether `value` is a valid non-null value of this kind.
  pub fn accepts(self, value: &Value) -> bool {
    match (self, value) {
      (Self::Text, Value::String(_)) => true,
      (Self::Integer, Value::Number(n)) => n.is_i64(),
      (Self::Real, Value::Number(_)) => true,
      (Self::Boolean, Value::Bool(_)) => true,
      (Self::Blob, Value::String(s)) => hex::decode(s).is_ok(),
      _ => false,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
  pub name:         String,
  pub kind:         AttributeKind,
  #[serde(default)]
  pub optional:     bool,
  /// Value used when a record (or a migration) does not provide one.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default:      Option<Value>,
  /// The attribute's name in the previous version, if it was renamed.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub renamed_from: Option<String>,
}

impl Attribute {
  pub fn new(name: impl Into<String>, kind: AttributeKind) -> Self {
    Self {
      name: name.into(),
      kind,
      optional: false,
      default: None,
      renamed_from: None,
    }
  }

  pub fn optional(mut self) -> Self {
    self.optional = true;
    self
  }

  pub fn with_default(mut self, default: impl Into<Value>) -> Self {
    self.default = Some(default.into());
    self
  }

  pub fn renamed_from(mut self, old_name: impl Into<String>) -> Self {
    self.renamed_from = Some(old_name.into());
    self
  }
}

// ─── Entities ────────────────────────────────────────────────────────────────

/// A named record collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
  pub name:         String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub renamed_from: Option<String>,
  #[serde(default)]
  pub attributes:   Vec<Attribute>,
}

impl Entity {
  pub fn new(name: impl Into<String>, attributes: Vec<Attribute>) -> Self {
    Self { name: name.into(), renamed_from: None, attributes }
  }

  pub fn renamed_from(mut self, old_name: impl Into<String>) -> Self {
    self.renamed_from = Some(old_name.into());
    self
  }

  pub fn attribute(&self, name: &str) -> Option<&Attribute> {
    self.attributes.iter().find(|a| a.name == name)
  }
}

// ─── Models ──────────────────────────────────────────────────────────────────

/// A loaded schema definition for one version.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchemaModel {
  /// Names of the versions this model represents. Inventory-loaded models
  /// carry exactly their version name.
  #[serde(default)]
  pub version_identifiers: BTreeSet<String>,
  /// Extra input to the structural hash, for versions whose structure is
  /// otherwise identical to their predecessor.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub hash_modifier:       Option<String>,
  #[serde(default)]
  pub entities:            Vec<Entity>,
}

impl SchemaModel {
  pub fn new(entities: Vec<Entity>) -> Self {
    Self { entities, ..Self::default() }
  }

  /// Parse and validate a model from JSON.
  pub fn from_json(json: &str) -> Result<Self, SchemaError> {
    let model: Self = serde_json::from_str(json)?;
    model.validate()?;
    Ok(model)
  }

  /// Read, parse and validate a model file.
  pub fn load(path: &Path) -> Result<Self, SchemaError> {
    let json = fs::read_to_string(path).map_err(|source| SchemaError::Io {
      path: path.to_owned(),
      source,
    })?;
    Self::from_json(&json)
  }

  pub fn to_json(&self) -> Result<String, SchemaError> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  pub fn entity(&self, name: &str) -> Option<&Entity> {
    self.entities.iter().find(|e| e.name == name)
  }

  /// Replace the version identifiers with the single name `version`.
  pub fn with_version_identifier(mut self, version: impl Into<String>) -> Self {
    self.version_identifiers = BTreeSet::from([version.into()]);
    self
  }

  pub fn with_hash_modifier(mut self, modifier: impl Into<String>) -> Self {
    self.hash_modifier = Some(modifier.into());
    self
  }

  /// Check names and defaults.
  ///
  /// Names must be unique ignoring ASCII case, since store engines such as
  /// SQLite fold the case of table and column names.
  pub fn validate(&self) -> Result<(), SchemaError> {
    let mut entity_names = HashSet::new();
    for entity in &self.entities {
      if entity.name.is_empty() {
        return Err(SchemaError::EmptyName);
      }
      if !entity_names.insert(entity.name.to_ascii_lowercase()) {
        return Err(SchemaError::DuplicateEntity(entity.name.clone()));
      }

      let mut attribute_names = HashSet::new();
      for attribute in &entity.attributes {
        if attribute.name.is_empty() {
          return Err(SchemaError::EmptyName);
        }
        if attribute.name.eq_ignore_ascii_case(RESERVED_ATTRIBUTE) {
          return Err(SchemaError::ReservedAttribute {
            entity:    entity.name.clone(),
            attribute: attribute.name.clone(),
          });
        }
        if !attribute_names.insert(attribute.name.to_ascii_lowercase()) {
          return Err(SchemaError::DuplicateAttribute {
            entity:    entity.name.clone(),
            attribute: attribute.name.clone(),
          });
        }
        if let Some(default) = &attribute.default
          && !attribute.kind.accepts(default)
        {
          return Err(SchemaError::InvalidDefault {
            entity:    entity.name.clone(),
            attribute: attribute.name.clone(),
            kind:      attribute.kind,
          });
        }
      }
    }
    Ok(())
  }

  /// SHA-256 over the model's structure, hex encoded.
  ///
  /// Covers entity names, attribute names, kinds and optionality, plus the
  /// hash modifier. Order of declaration, defaults, renaming hints and version
  /// identifiers do not contribute.
  pub fn structural_hash(&self) -> String {
    let mut entities: Vec<&Entity> = self.entities.iter().collect();
    entities.sort_by(|a, b| a.name.cmp(&b.name));

    let mut hasher = Sha256::new();
    for entity in entities {
      hasher.update(b"entity\0");
      hasher.update(entity.name.as_bytes());
      hasher.update([0]);

      let mut attributes: Vec<&Attribute> = entity.attributes.iter().collect();
      attributes.sort_by(|a, b| a.name.cmp(&b.name));
      for attribute in attributes {
        hasher.update(b"attribute\0");
        hasher.update(attribute.name.as_bytes());
        hasher.update([0]);
        hasher.update(attribute.kind.to_string().as_bytes());
        hasher.update([0, u8::from(attribute.optional)]);
      }
    }
    if let Some(modifier) = &self.hash_modifier {
      hasher.update(b"modifier\0");
      hasher.update(modifier.as_bytes());
    }
    hex::encode(hasher.finalize())
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn person() -> Entity {
    Entity::new("Person", vec![
      Attribute::new("name", AttributeKind::Text),
      Attribute::new("email", AttributeKind::Text).optional(),
    ])
  }

  #[test]
  fn hash_ignores_declaration_order_and_defaults() {
    let a = SchemaModel::new(vec![person(), Entity::new("Group", vec![])]);

    let mut reordered = person();
    reordered.attributes.reverse();
    reordered.attributes[0].default = Some(json!("nobody@example.com"));
    let b = SchemaModel::new(vec![Entity::new("Group", vec![]), reordered])
      .with_version_identifier("Model 9");

    assert_eq!(a.structural_hash(), b.structural_hash());
  }

  #[test]
  fn hash_changes_with_structure() {
    let base = SchemaModel::new(vec![person()]);

    let mut optional_name = person();
    optional_name.attributes[0].optional = true;
    let changed = SchemaModel::new(vec![optional_name]);

    assert_ne!(base.structural_hash(), changed.structural_hash());
  }

  #[test]
  fn hash_modifier_distinguishes_identical_structures() {
    let base = SchemaModel::new(vec![person()]);
    let modified = SchemaModel::new(vec![person()]).with_hash_modifier("2");
    assert_ne!(base.structural_hash(), modified.structural_hash());
  }

  #[test]
  fn parses_json_definitions() {
    let model = SchemaModel::from_json(
      r#"{
        "entities": [{
          "name": "Person",
          "attributes": [
            { "name": "name", "kind": "text" },
            { "name": "starred", "kind": "boolean", "default": false }
          ]
        }]
      }"#,
    )
    .unwrap();

    let starred = model.entity("Person").unwrap().attribute("starred").unwrap();
    assert_eq!(starred.kind, AttributeKind::Boolean);
    assert!(!starred.optional);
    assert_eq!(starred.default, Some(json!(false)));
  }

  #[test]
  fn rejects_reserved_and_duplicate_names() {
    let reserved = SchemaModel::new(vec![Entity::new("Person", vec![
      Attribute::new("pk", AttributeKind::Integer),
    ])]);
    assert!(matches!(
      reserved.validate(),
      Err(SchemaError::ReservedAttribute { .. })
    ));

    let duplicated = SchemaModel::new(vec![person(), person()]);
    assert!(matches!(
      duplicated.validate(),
      Err(SchemaError::DuplicateEntity(name)) if name == "Person"
    ));
  }

  #[test]
  fn names_collide_regardless_of_case() {
    let entities =
      SchemaModel::new(vec![person(), Entity::new("person", vec![])]);
    assert!(matches!(
      entities.validate(),
      Err(SchemaError::DuplicateEntity(name)) if name == "person"
    ));

    let attributes = SchemaModel::new(vec![Entity::new("Person", vec![
      Attribute::new("name", AttributeKind::Text),
      Attribute::new("Name", AttributeKind::Text),
    ])]);
    assert!(matches!(
      attributes.validate(),
      Err(SchemaError::DuplicateAttribute { attribute, .. }) if attribute == "Name"
    ));

    let reserved = SchemaModel::new(vec![Entity::new("Person", vec![
      Attribute::new("PK", AttributeKind::Integer),
    ])]);
    assert!(matches!(
      reserved.validate(),
      Err(SchemaError::ReservedAttribute { .. })
    ));
  }

  #[test]
  fn rejects_defaults_of_the_wrong_kind() {
    let model = SchemaModel::new(vec![Entity::new("Person", vec![
      Attribute::new("age", AttributeKind::Integer).with_default("old"),
    ])]);
    assert!(matches!(
      model.validate(),
      Err(SchemaError::InvalidDefault { kind: AttributeKind::Integer, .. })
    ));
  }
}
