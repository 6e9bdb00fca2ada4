//! SQL schema for Ladder SQLite stores.
//!
//! Entity tables are generated from the model a store is saved with. Every
//! table carries an `INTEGER PRIMARY KEY` row identifier named after
//! [`RESERVED_ATTRIBUTE`], which migrations carry over unchanged.

use ladder_core::schema::{AttributeKind, Entity, RESERVED_ATTRIBUTE};

pub const METADATA_TABLE: &str = "ladder_metadata";

pub const STORAGE_TYPE_KEY: &str = "storage_type";
pub const VERSION_IDENTIFIERS_KEY: &str = "version_identifiers";
pub const STRUCTURAL_HASH_KEY: &str = "structural_hash";
pub const SAVED_AT_KEY: &str = "saved_at";

/// Metadata table DDL; one row per key.
pub const METADATA_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS ladder_metadata (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

pub fn quote_identifier(name: &str) -> String {
  format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn sql_type(kind: AttributeKind) -> &'static str {
  match kind {
    AttributeKind::Text => "TEXT",
    AttributeKind::Integer | AttributeKind::Boolean => "INTEGER",
    AttributeKind::Real => "REAL",
    AttributeKind::Blob => "BLOB",
  }
}

/// `CREATE TABLE` statement for `entity`.
///
/// Defaults are applied on insert rather than in the DDL, so they never
/// depend on SQL literal quoting.
pub fn create_table_sql(entity: &Entity) -> String {
  let mut columns = vec![format!(
    "    {} INTEGER PRIMARY KEY",
    quote_identifier(RESERVED_ATTRIBUTE)
  )];
  for attribute in &entity.attributes {
    let null = if attribute.optional { "" } else { " NOT NULL" };
    columns.push(format!(
      "    {} {}{null}",
      quote_identifier(&attribute.name),
      sql_type(attribute.kind)
    ));
  }
  format!(
    "CREATE TABLE {} (\n{}\n);",
    quote_identifier(&entity.name),
    columns.join(",\n")
  )
}
