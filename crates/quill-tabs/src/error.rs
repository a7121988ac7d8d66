//! Tab error types
//!
//! These only surface inside the crate: persistence is best-effort and
//! failures are logged, never returned from a tab operation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TabError {
    #[error("Storage error: {0}")]
    Storage(#[from] quill_storage::StorageError),

    #[error("Malformed tab state: {0}")]
    Serialization(#[from] serde_json::Error),
}
