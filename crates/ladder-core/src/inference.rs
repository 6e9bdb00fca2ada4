//! Structural mapping inference between two adjacent models.

use crate::{
  error::InferenceError,
  mapping::{AttributeMapping, EntityMapping, Mapping, MappingOrigin, ValueExpression},
  planner::MigrationStep,
  schema::{Attribute, Entity, SchemaModel},
};

/// Synthesises a [`Mapping`] for a step that has no hand-written one.
pub trait MappingInference {
  fn infer(&self, step: &MigrationStep) -> Result<Mapping, InferenceError>;
}

/// Lightweight-migration rules over the two models' structure.
///
/// - Entities and attributes are matched by name, or by the target's
///   `renamed_from` hint, which wins when both resolve.
/// - Unmatched target entities start empty; unmatched source entities and
///   attributes are dropped.
/// - A new attribute takes its default, or null when optional.
/// - Kind changes and new required values without a default cannot be
///   inferred.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralInference;

impl MappingInference for StructuralInference {
  fn infer(&self, step: &MigrationStep) -> Result<Mapping, InferenceError> {
    let entities = step
      .target_model
      .entities
      .iter()
      .map(|target| infer_entity(&step.source_model, target))
      .collect::<Result<Vec<_>, _>>()?;

    Ok(Mapping {
      origin: MappingOrigin::Inferred,
      source_version: step.source_version.clone(),
      target_version: step.target_version.clone(),
      entities,
    })
  }
}

fn infer_entity(
  source: &SchemaModel,
  target: &Entity,
) -> Result<EntityMapping, InferenceError> {
  let found = find_source(target.renamed_from.as_deref(), &target.name, |n| {
    source.entity(n)
  });
  let Some(source_entity) = found else {
    return Ok(EntityMapping {
      target_entity: target.name.clone(),
      source_entity: None,
      attributes:    Vec::new(),
      seed:          Vec::new(),
    });
  };

  let attributes = target
    .attributes
    .iter()
    .map(|attribute| infer_attribute(source_entity, &target.name, attribute))
    .collect::<Result<Vec<_>, _>>()?;

  Ok(EntityMapping {
    target_entity: target.name.clone(),
    source_entity: Some(source_entity.name.clone()),
    attributes,
    seed: Vec::new(),
  })
}

fn infer_attribute(
  source_entity: &Entity,
  target_entity: &str,
  target: &Attribute,
) -> Result<AttributeMapping, InferenceError> {
  let found = find_source(target.renamed_from.as_deref(), &target.name, |n| {
    source_entity.attribute(n)
  });

  let value = match found {
    Some(source) => {
      if source.kind != target.kind {
        return Err(InferenceError::KindChanged {
          entity:    target_entity.to_owned(),
          attribute: target.name.clone(),
          from:      source.kind,
          to:        target.kind,
        });
      }
      match (source.optional, target.optional, &target.default) {
        (true, false, Some(default)) => ValueExpression::SourceOrDefault {
          attribute: source.name.clone(),
          default:   default.clone(),
        },
        (true, false, None) => {
          return Err(InferenceError::BecameRequired {
            entity:    target_entity.to_owned(),
            attribute: target.name.clone(),
          });
        }
        _ => ValueExpression::Source(source.name.clone()),
      }
    }
    None => match (&target.default, target.optional) {
      (Some(default), _) => ValueExpression::Constant(default.clone()),
      (None, true) => ValueExpression::Null,
      (None, false) => {
        return Err(InferenceError::MissingValue {
          entity:    target_entity.to_owned(),
          attribute: target.name.clone(),
        });
      }
    },
  };

  Ok(AttributeMapping { target: target.name.clone(), value })
}

fn find_source<'a, T>(
  renamed_from: Option<&str>,
  name: &str,
  lookup: impl Fn(&str) -> Option<&'a T>,
) -> Option<&'a T> {
  renamed_from.and_then(&lookup).or_else(|| lookup(name))
}
