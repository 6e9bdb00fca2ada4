//! CLI configuration: `ladder.toml`, `LADDER_*` variables, then flags.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CliConfig {
  /// Schema package directory, or `<dir>/<Name>` to look up
  /// `<dir>/<Name>.schemapkg`.
  pub package:  Option<PathBuf>,
  pub store:    Option<PathBuf>,
  /// Where temporary stores are written during a migration.
  pub temp_dir: Option<PathBuf>,
}

impl CliConfig {
  /// Read `path` if it exists, layered under `LADDER_*` environment
  /// variables.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path.to_path_buf()).required(false))
      .add_source(config::Environment::with_prefix("LADDER"))
      .build()
      .context("failed to read config file")?;

    settings
      .try_deserialize()
      .context("failed to deserialise CliConfig")
  }

  /// Values set in `overrides` replace those in `self`.
  pub fn override_with(self, overrides: Self) -> Self {
    Self {
      package:  overrides.package.or(self.package),
      store:    overrides.store.or(self.store),
      temp_dir: overrides.temp_dir.or(self.temp_dir),
    }
  }

  pub fn package(&self) -> anyhow::Result<PathBuf> {
    match &self.package {
      Some(path) => Ok(expand_tilde(path)),
      None => bail!("no schema package given; pass --package or set `package` in the config file"),
    }
  }

  pub fn store(&self) -> anyhow::Result<PathBuf> {
    match &self.store {
      Some(path) => Ok(expand_tilde(path)),
      None => bail!("no store given; pass --store or set `store` in the config file"),
    }
  }

  pub fn temp_dir(&self) -> PathBuf {
    self
      .temp_dir
      .as_deref()
      .map(expand_tilde)
      .unwrap_or_else(std::env::temp_dir)
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
