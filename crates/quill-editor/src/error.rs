//! Editor error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Checkpoint not found: {0}")]
    CheckpointNotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] quill_storage::StorageError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
