//! Schema version names and their migration order.
//!
//! A version's identity is its name. The order is derived from the name: the
//! non-numeric prefix first, then the trailing integer compared numerically,
//! so `Model 2` sorts before `Model 10`. A name with no trailing integer
//! counts as `0`.

use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};

// ─── SchemaVersion ───────────────────────────────────────────────────────────

/// A named, ordered snapshot of a store's structural definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaVersion {
  name: String,
}

impl SchemaVersion {
  pub fn new(name: impl Into<String>) -> Self { Self { name: name.into() } }

  pub fn name(&self) -> &str { &self.name }

  /// The key this version sorts by.
  pub fn ordering_key(&self) -> OrderingKey<'_> { OrderingKey::of(&self.name) }
}

impl From<&str> for SchemaVersion {
  fn from(name: &str) -> Self { Self::new(name) }
}

impl From<String> for SchemaVersion {
  fn from(name: String) -> Self { Self::new(name) }
}

impl fmt::Display for SchemaVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.name)
  }
}

impl Ord for SchemaVersion {
  fn cmp(&self, other: &Self) -> Ordering {
    // Names like "Model 1" and "Model 01" share a key; fall back to the name
    // so the order stays consistent with equality.
    self
      .ordering_key()
      .cmp(&other.ordering_key())
      .then_with(|| self.name.cmp(&other.name))
  }
}

impl PartialOrd for SchemaVersion {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

// ─── OrderingKey ─────────────────────────────────────────────────────────────

/// A version name split into its non-numeric prefix and trailing integer.
///
/// The integer is kept as its decimal digits with leading zeros removed, which
/// compares correctly for any length without overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderingKey<'a> {
  pub prefix: &'a str,
  digits:     &'a str,
}

impl<'a> OrderingKey<'a> {
  pub fn of(name: &'a str) -> Self {
    let split = name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    let (prefix, digits) = name.split_at(split);
    Self {
      prefix: prefix.trim_end(),
      digits: digits.trim_start_matches('0'),
    }
  }
}

impl Ord for OrderingKey<'_> {
  fn cmp(&self, other: &Self) -> Ordering {
    self
      .prefix
      .cmp(other.prefix)
      .then_with(|| self.digits.len().cmp(&other.digits.len()))
      .then_with(|| self.digits.cmp(other.digits))
  }
}

impl PartialOrd for OrderingKey<'_> {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}
