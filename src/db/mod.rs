//! Database module: SQL repository functions and the storage trait.
//!
//! - `repo`: SQL-only functions that map rows into `InstanceRecord`s.
//! - `store`: the `InstanceStore` seam the reconciler talks to.
//!
//! The repository API is re-exported at `evo_sync::db::*`.

pub mod repo;
pub mod store;

pub use repo::*;
pub use store::{InstanceStore, SqliteStore};
