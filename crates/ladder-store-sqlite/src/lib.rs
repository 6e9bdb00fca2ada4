//! SQLite engine for Ladder.
//!
//! Each store is a single SQLite file: one table per entity plus a
//! `ladder_metadata` table recording the model the file was saved with.
//! Access is synchronous; async callers should move work onto a blocking
//! thread.

mod encode;
mod engine;
mod schema;
mod store;

pub mod error;

pub use engine::{FILE_EXTENSION, SqliteEngine};
pub use error::{Error, Result};
pub use store::{SqliteStore, StoreInfo, read_store_info};

#[cfg(test)]
mod tests;
