//! [`SchemaInventory`] — the ordered catalog of every schema version in a
//! package.
//!
//! A schema package is a directory:
//!
//! ```text
//! Contacts.schemapkg/
//!   primary.json        the primary definition, i.e. the current version
//!   VersionInfo.json    { "version_hashes": { "<version>": "<hash>", ... } }
//!   <version>.json      one definition per version
//!   mappings/*.json     optional hand-written mappings
//! ```

use std::{
  collections::{BTreeMap, HashMap},
  fs,
  path::{Path, PathBuf},
  sync::Arc,
};

use serde::Deserialize;

use crate::{
  Error, Result,
  error::IntrospectionError,
  schema::SchemaModel,
  version::SchemaVersion,
};

pub const PACKAGE_EXTENSION: &str = "schemapkg";
pub const PRIMARY_MODEL_FILE: &str = "primary.json";
pub const VERSION_INFO_FILE: &str = "VersionInfo.json";
pub const MAPPINGS_DIR: &str = "mappings";

/// The manifest listing each version's structural hash.
#[derive(Deserialize)]
struct VersionInfo {
  version_hashes: BTreeMap<String, String>,
}

/// Every known version of a package, sorted oldest to newest, with its model.
///
/// Immutable once built; the planner and migrator only borrow it.
#[derive(Debug, Clone)]
pub struct SchemaInventory {
  package_path: PathBuf,
  current:      SchemaVersion,
  versions:     Vec<SchemaVersion>,
  models:       HashMap<SchemaVersion, Arc<SchemaModel>>,
}

impl SchemaInventory {
  /// Locate `<search_dir>/<name>.schemapkg` and load it.
  pub fn from_package_name(
    name: &str,
    search_dir: impl AsRef<Path>,
  ) -> Result<Self, IntrospectionError> {
    let search_dir = search_dir.as_ref();
    let path = search_dir.join(format!("{name}.{PACKAGE_EXTENSION}"));
    if !path.is_dir() {
      return Err(IntrospectionError::CannotFindPackage {
        name:       name.to_owned(),
        search_dir: search_dir.to_owned(),
      });
    }
    Self::from_package_path(path)
  }

  /// Load the package at `path`.
  ///
  /// The current version is the one whose manifest hash matches the primary
  /// definition.
  pub fn from_package_path(
    path: impl AsRef<Path>,
  ) -> Result<Self, IntrospectionError> {
    let path = path.as_ref();

    let primary = SchemaModel::load(&path.join(PRIMARY_MODEL_FILE)).map_err(
      |source| IntrospectionError::FailedToLoadCurrentModel {
        path: path.to_owned(),
        source,
      },
    )?;

    let info_path = path.join(VERSION_INFO_FILE);
    let info_json = fs::read_to_string(&info_path).map_err(|source| {
      IntrospectionError::FailedToLoadVersionInfoFile {
        path: info_path.clone(),
        source,
      }
    })?;
    let info: VersionInfo = serde_json::from_str(&info_json).map_err(|source| {
      IntrospectionError::FailedToLoadVersionHashes { path: info_path, source }
    })?;

    let primary_hash = primary.structural_hash();
    let mut entries = Vec::with_capacity(info.version_hashes.len());
    let mut matching_primary = Vec::new();

    for (name, expected) in info.version_hashes {
      if !is_valid_version_name(&name) {
        return Err(IntrospectionError::InvalidVersionName(name));
      }

      let model = SchemaModel::load(&path.join(format!("{name}.json")))
        .map_err(|source| IntrospectionError::FailedToLoadVersionModel {
          name: name.clone(),
          source,
        })?;

      let actual = model.structural_hash();
      if actual != expected {
        return Err(IntrospectionError::VersionHashMismatch {
          name,
          expected,
          actual,
        });
      }

      let version = SchemaVersion::new(name.as_str());
      if expected == primary_hash {
        matching_primary.push(version.clone());
      }
      entries.push((version, model.with_version_identifier(name)));
    }

    // Several versions can share a hash when one forgot its hash modifier;
    // the newest of them is the only one that can be current.
    let current = matching_primary
      .into_iter()
      .max()
      .ok_or(IntrospectionError::CurrentVersionNotFound)?;

    let inventory = Self::from_parts(path, current, entries)?;
    tracing::debug!(
      package = %path.display(),
      versions = inventory.versions.len(),
      current = %inventory.current,
      "loaded schema inventory"
    );
    Ok(inventory)
  }

  /// Build an inventory from already-loaded versions, in any order.
  ///
  /// `current` must be one of the versions and the newest of them.
  pub fn from_parts(
    package_path: impl Into<PathBuf>,
    current: SchemaVersion,
    entries: impl IntoIterator<Item = (SchemaVersion, SchemaModel)>,
  ) -> Result<Self, IntrospectionError> {
    let mut versions = Vec::new();
    let mut models = HashMap::new();
    for (version, model) in entries {
      if models.insert(version.clone(), Arc::new(model)).is_some() {
        return Err(IntrospectionError::DuplicateVersion(version.name().to_owned()));
      }
      versions.push(version);
    }
    versions.sort();

    if !models.contains_key(&current) {
      return Err(IntrospectionError::CurrentVersionNotFound);
    }
    if let Some(newest) = versions.last()
      && *newest != current
    {
      return Err(IntrospectionError::CurrentVersionNotNewest {
        current,
        newest: newest.clone(),
      });
    }

    Ok(Self {
      package_path: package_path.into(),
      current,
      versions,
      models,
    })
  }

  pub fn package_path(&self) -> &Path { &self.package_path }

  /// All versions, oldest first.
  pub fn versions(&self) -> &[SchemaVersion] { &self.versions }

  pub fn current_version(&self) -> &SchemaVersion { &self.current }

  pub fn current_model(&self) -> &Arc<SchemaModel> {
    // `from_parts` guarantees the current version has a model.
    &self.models[&self.current]
  }

  pub fn contains(&self, name: &str) -> bool { self.version(name).is_some() }

  /// Look a version up by name.
  pub fn version(&self, name: &str) -> Option<&SchemaVersion> {
    self.versions.iter().find(|v| v.name() == name)
  }

  /// Index of `version` in [`versions`](Self::versions).
  pub fn position(&self, version: &SchemaVersion) -> Option<usize> {
    self.versions.binary_search(version).ok()
  }

  pub fn model(&self, version: &SchemaVersion) -> Option<&Arc<SchemaModel>> {
    self.models.get(version)
  }

  /// Models for every version in `versions`, in the same order.
  ///
  /// All or nothing: one unknown version fails the whole call.
  pub fn models(&self, versions: &[SchemaVersion]) -> Result<Vec<Arc<SchemaModel>>> {
    versions
      .iter()
      .map(|version| {
        self
          .model(version)
          .cloned()
          .ok_or_else(|| Error::UnknownVersion(version.name().to_owned()))
      })
      .collect()
  }
}

/// Version names double as file stems inside the package.
fn is_valid_version_name(name: &str) -> bool {
  !name.is_empty()
    && name != "."
    && name != ".."
    && !name.contains(['/', '\\'])
    && Path::new(name).file_name().is_some()
}
