//! Quill Storage Layer
//!
//! Key-value persistence for editor UI state (open tabs, active selection).
//! Callers depend on the [`KeyValueStore`] capability, not on a medium:
//! [`MemoryStore`] for tests and ephemeral sessions, [`Database`] for SQLite.

mod database;
mod error;
mod migrations;
mod store;

pub use database::Database;
pub use error::StorageError;
pub use store::{KeyValueStore, MemoryStore};

pub type Result<T> = std::result::Result<T, StorageError>;
