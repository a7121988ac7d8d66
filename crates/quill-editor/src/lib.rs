//! Quill Editor Tabs
//!
//! The template editor's layer over [`quill_tabs::TabManager`]: per-tab
//! unsaved-change flags, a confirmation step before a dirty tab closes, and
//! bounded checkpoint history for template fields.

mod checkpoint;
mod error;
mod prompt;
mod template_tabs;

pub use checkpoint::{apply_changes, Checkpoint, CheckpointHistory, FieldChange, TemplateFields};
pub use error::EditorError;
pub use prompt::ConfirmPrompt;
pub use template_tabs::TemplateTabs;

pub type Result<T> = std::result::Result<T, EditorError>;
