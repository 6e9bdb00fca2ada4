//! Compatibility oracles: can a model open a store without transformation?

use crate::{metadata::StoreMetadata, schema::SchemaModel};

pub trait CompatibilityOracle {
  fn is_compatible(&self, model: &SchemaModel, metadata: &StoreMetadata) -> bool;
}

/// Compatible when the store was saved with a structurally identical model.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralHashOracle;

impl CompatibilityOracle for StructuralHashOracle {
  fn is_compatible(&self, model: &SchemaModel, metadata: &StoreMetadata) -> bool {
    metadata.structural_hash == model.structural_hash()
  }
}

impl<F> CompatibilityOracle for F
where
  F: Fn(&SchemaModel, &StoreMetadata) -> bool,
{
  fn is_compatible(&self, model: &SchemaModel, metadata: &StoreMetadata) -> bool {
    self(model, metadata)
  }
}
