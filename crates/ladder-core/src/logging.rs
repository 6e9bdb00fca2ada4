//! The logging interface the migrator reports progress through.
//!
//! Messages carry no return-value semantics; a logger may drop them.

use std::sync::Arc;

pub trait MigrationLogger {
  fn debug(&self, message: &str);
  fn info(&self, message: &str);
  fn error(&self, message: &str);
  fn fatal(&self, message: &str);
}

/// Forwards every message to [`tracing`] under the `ladder::migration`
/// target. `fatal` is emitted at error level with `fatal = true`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl MigrationLogger for TracingLogger {
  fn debug(&self, message: &str) {
    tracing::debug!(target: "ladder::migration", "{message}");
  }

  fn info(&self, message: &str) {
    tracing::info!(target: "ladder::migration", "{message}");
  }

  fn error(&self, message: &str) {
    tracing::error!(target: "ladder::migration", "{message}");
  }

  fn fatal(&self, message: &str) {
    tracing::error!(target: "ladder::migration", fatal = true, "{message}");
  }
}

impl<L: MigrationLogger + ?Sized> MigrationLogger for &L {
  fn debug(&self, message: &str) { (**self).debug(message) }

  fn info(&self, message: &str) { (**self).info(message) }

  fn error(&self, message: &str) { (**self).error(message) }

  fn fatal(&self, message: &str) { (**self).fatal(message) }
}

impl<L: MigrationLogger + ?Sized> MigrationLogger for Arc<L> {
  fn debug(&self, message: &str) { (**self).debug(message) }

  fn info(&self, message: &str) { (**self).info(message) }

  fn error(&self, message: &str) { (**self).error(message) }

  fn fatal(&self, message: &str) { (**self).fatal(message) }
}
