//! `ladder` — inspect, create and migrate SQLite stores against a schema
//! package.
//!
//! # Usage
//!
//! ```text
//! ladder --package Contacts.schemapkg versions
//! ladder --store contacts.sqlite inspect
//! ladder --package Contacts.schemapkg --store contacts.sqlite init --at "Model 1"
//! ladder --package Contacts.schemapkg --store contacts.sqlite migrate
//! ```
//!
//! Paths may also come from `ladder.toml` (or `--config`) and `LADDER_*`
//! environment variables; flags win.

mod settings;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, anyhow};
use clap::{Parser, Subcommand};
use ladder_core::{
  IterativeMigrator, SchemaInventory, SchemaVersion, inventory::PACKAGE_EXTENSION,
  mapping::MappingCatalog,
};
use ladder_store_sqlite::{SqliteEngine, SqliteStore, read_store_info};
use settings::CliConfig;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "ladder", author, version, about = "Iterative schema migrator")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "ladder.toml")]
  config: PathBuf,

  /// Schema package directory.
  #[arg(long, global = true)]
  package: Option<PathBuf>,

  /// Store file.
  #[arg(long, global = true)]
  store: Option<PathBuf>,

  /// Directory for temporary stores.
  #[arg(long, global = true)]
  temp_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// List the package's versions, oldest first.
  Versions,
  /// Show what a store was last saved with.
  Inspect,
  /// Create an empty store saved with a version of the package.
  Init {
    /// Version to create the store with (default: current).
    #[arg(long)]
    at: Option<String>,
  },
  /// Migrate a store to a version of the package.
  Migrate {
    /// Target version (default: current).
    #[arg(long)]
    to: Option<String>,
  },
}

impl Cli {
  fn overrides(&self) -> CliConfig {
    CliConfig {
      package:  self.package.clone(),
      store:    self.store.clone(),
      temp_dir: self.temp_dir.clone(),
    }
  }
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let config = CliConfig::load(&cli.config)?.override_with(cli.overrides());

  match cli.command {
    Command::Versions => versions(&config),
    Command::Inspect => inspect(&config),
    Command::Init { at } => init(&config, at.as_deref()),
    // Migration is synchronous file and SQLite work.
    Command::Migrate { to } => {
      tokio::task::spawn_blocking(move || migrate(&config, to.as_deref()))
        .await
        .context("migration task failed")?
    }
  }
}

// ─── Commands ────────────────────────────────────────────────────────────────

fn versions(config: &CliConfig) -> anyhow::Result<()> {
  let inventory = load_inventory(&config.package()?)?;
  for version in inventory.versions() {
    let marker = if version == inventory.current_version() { "*" } else { " " };
    let hash = inventory
      .model(version)
      .map(|m| m.structural_hash())
      .unwrap_or_default();
    println!("{marker} {version}  {}", &hash[..hash.len().min(12)]);
  }
  Ok(())
}

fn inspect(config: &CliConfig) -> anyhow::Result<()> {
  let store = config.store()?;
  let info = read_store_info(&store)
    .with_context(|| format!("failed to read store at {}", store.display()))?;

  let identifiers: Vec<&str> = info
    .metadata
    .version_identifiers
    .iter()
    .map(String::as_str)
    .collect();
  println!("storage type:    {}", info.metadata.storage_type);
  println!("versions:        {}", identifiers.join(", "));
  println!("structural hash: {}", info.metadata.structural_hash);
  if let Some(saved_at) = info.saved_at {
    println!("saved at:        {}", saved_at.to_rfc3339());
  }
  Ok(())
}

fn init(config: &CliConfig, version: Option<&str>) -> anyhow::Result<()> {
  let inventory = load_inventory(&config.package()?)?;
  let store = config.store()?;
  let version = target_version(&inventory, version);
  let model = inventory
    .model(&version)
    .ok_or_else(|| anyhow!("unknown schema version: {version}"))?;

  SqliteStore::create(&store, model)
    .with_context(|| format!("failed to create store at {}", store.display()))?;
  tracing::info!(store = %store.display(), %version, "created store");
  Ok(())
}

fn migrate(config: &CliConfig, to: Option<&str>) -> anyhow::Result<()> {
  let inventory = load_inventory(&config.package()?)?;
  let store = config.store()?;
  let target = target_version(&inventory, to);
  let mappings = MappingCatalog::from_package_path(inventory.package_path())
    .context("failed to load authored mappings")?;

  let engine = SqliteEngine;
  let outcome = IterativeMigrator::new(&engine, &inventory)
    .with_mappings(mappings)
    .with_temp_dir(config.temp_dir())
    .migrate(&store, &target)
    .with_context(|| format!("failed to migrate {}", store.display()))?;

  println!("{outcome}");
  Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Load a package directory, or `<dir>/<Name>` as `<dir>/<Name>.schemapkg`.
fn load_inventory(path: &Path) -> anyhow::Result<SchemaInventory> {
  let inventory = if path.is_dir()
    || path.extension().is_some_and(|ext| ext == PACKAGE_EXTENSION)
  {
    SchemaInventory::from_package_path(path)
  } else {
    let name = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .ok_or_else(|| anyhow!("invalid package path {}", path.display()))?;
    let search_dir = path.parent().unwrap_or_else(|| Path::new("."));
    SchemaInventory::from_package_name(&name, search_dir)
  };
  inventory.with_context(|| format!("failed to load schema package {}", path.display()))
}

fn target_version(inventory: &SchemaInventory, name: Option<&str>) -> SchemaVersion {
  name
    .map(SchemaVersion::from)
    .unwrap_or_else(|| inventory.current_version().clone())
}
