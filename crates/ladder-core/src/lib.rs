//! Core types for Ladder, the iterative schema migrator.
//!
//! A store saved with an old version of a schema is upgraded by walking every
//! intermediate version in order, one transform per adjacent pair, and only
//! replacing the original once the whole chain succeeded.
//!
//! This crate knows nothing about any particular database. Backends implement
//! [`engine::StoreEngine`]; everything else lives here.

pub mod engine;
pub mod error;
pub mod inference;
pub mod inventory;
pub mod logging;
pub mod mapping;
pub mod metadata;
pub mod migrator;
pub mod oracle;
pub mod planner;
pub mod schema;
pub mod temporary;
pub mod version;

pub use error::{Error, Result};
pub use inventory::SchemaInventory;
pub use migrator::{IterativeMigrator, MigrationOutcome, MigrationReport};
pub use version::SchemaVersion;
