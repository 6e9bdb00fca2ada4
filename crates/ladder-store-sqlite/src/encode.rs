//! Conversions between record values and SQLite column values.
//!
//! Records carry JSON values. Booleans are stored as `0`/`1`, blobs travel
//! as lowercase hex strings in records and as raw bytes in SQLite, and
//! timestamps in the metadata table are RFC 3339 strings.

use chrono::{DateTime, Utc};
use ladder_core::schema::AttributeKind;
use rusqlite::types::Value as SqlValue;
use serde_json::{Number, Value};

use crate::{Error, Result};

// ─── Record values ───────────────────────────────────────────────────────────

/// The column value for `value`, or `None` if it is not a valid `kind`.
/// Null is valid for every kind.
pub fn encode_value(kind: AttributeKind, value: &Value) -> Option<SqlValue> {
  if value.is_null() {
    return Some(SqlValue::Null);
  }
  if !kind.accepts(value) {
    return None;
  }
  match (kind, value) {
    (AttributeKind::Text, Value::String(s)) => Some(SqlValue::Text(s.clone())),
    (AttributeKind::Integer, Value::Number(n)) => n.as_i64().map(SqlValue::Integer),
    (AttributeKind::Real, Value::Number(n)) => n.as_f64().map(SqlValue::Real),
    (AttributeKind::Boolean, Value::Bool(b)) => Some(SqlValue::Integer(i64::from(*b))),
    (AttributeKind::Blob, Value::String(s)) => hex::decode(s).ok().map(SqlValue::Blob),
    _ => None,
  }
}

/// The record value for a column of `kind`, or `None` if SQLite returned
/// something that kind cannot hold.
pub fn decode_value(kind: AttributeKind, value: SqlValue) -> Option<Value> {
  match (kind, value) {
    (_, SqlValue::Null) => Some(Value::Null),
    (AttributeKind::Text, SqlValue::Text(s)) => Some(Value::String(s)),
    (AttributeKind::Integer, SqlValue::Integer(i)) => Some(Value::from(i)),
    (AttributeKind::Real, SqlValue::Real(f)) => Number::from_f64(f).map(Value::Number),
    // REAL affinity keeps integral values written as integers.
    (AttributeKind::Real, SqlValue::Integer(i)) => {
      Number::from_f64(i as f64).map(Value::Number)
    }
    (AttributeKind::Boolean, SqlValue::Integer(i)) => Some(Value::Bool(i != 0)),
    (AttributeKind::Blob, SqlValue::Blob(bytes)) => Some(Value::String(hex::encode(bytes))),
    _ => None,
  }
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}
