//! Quill Core
//!
//! Wires storage, tabs and the editor layer together for the template
//! composer, and owns configuration and logging setup.

mod composer;
mod config;
mod error;

pub use composer::Composer;
pub use config::Config;
pub use error::CoreError;

// Re-export core components
pub use quill_editor::{
    apply_changes, Checkpoint, CheckpointHistory, ConfirmPrompt, EditorError, FieldChange,
    TemplateFields, TemplateTabs,
};
pub use quill_storage::{Database, KeyValueStore, MemoryStore, StorageError};
pub use quill_tabs::{BulkClose, CloseOutcome, Tab, TabManager, TabManagerConfig, TabsState};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
