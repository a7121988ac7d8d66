//! Template tabs
//!
//! Wraps a [`TabManager`] with unsaved-change tracking. A dirty tab only
//! closes after the [`ConfirmPrompt`] agrees. The tab manager itself never
//! sees the dirty flags, only the close interceptor built here.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use quill_storage::KeyValueStore;
use quill_tabs::{BulkClose, CloseOutcome, TabCloseInterceptor, TabManager, TabManagerConfig};

use crate::prompt::ConfirmPrompt;

type DirtySet = Arc<RwLock<HashSet<String>>>;

pub struct TemplateTabs {
    tabs: TabManager,
    dirty: DirtySet,
}

impl TemplateTabs {
    pub fn new(
        config: TabManagerConfig,
        store: Arc<dyn KeyValueStore>,
        prompt: Arc<dyn ConfirmPrompt>,
    ) -> Self {
        Self::build(config, prompt, |config| TabManager::new(config, store))
    }

    pub fn in_memory(config: TabManagerConfig, prompt: Arc<dyn ConfirmPrompt>) -> Self {
        Self::build(config, prompt, TabManager::in_memory)
    }

    fn build<F>(mut config: TabManagerConfig, prompt: Arc<dyn ConfirmPrompt>, make: F) -> Self
    where
        F: FnOnce(TabManagerConfig) -> TabManager,
    {
        let dirty: DirtySet = Arc::new(RwLock::new(HashSet::new()));

        let guard = close_guard(config.take_on_tab_close(), Arc::clone(&dirty), prompt);
        let mut tabs = make(config.on_tab_close(guard));

        // Forget flags of tabs that left without asking (capacity eviction)
        let tracked = Arc::clone(&dirty);
        tabs.subscribe(move |state| tracked.write().retain(|id| state.contains(id)));

        Self { tabs, dirty }
    }

    pub fn tabs(&self) -> &TabManager {
        &self.tabs
    }

    pub fn tabs_mut(&mut self) -> &mut TabManager {
        &mut self.tabs
    }

    pub fn open_template(&mut self, template_id: &str) -> bool {
        self.tabs.open_tab(template_id)
    }

    /// Open a tab for a template that has no id yet
    pub fn open_draft(&mut self) -> Option<String> {
        let id = format!("draft-{}", Uuid::new_v4());
        if !self.tabs.open_tab(&id) {
            return None;
        }
        self.tabs
            .set_tab_metadata(&id, "draft", serde_json::Value::Bool(true));

        tracing::info!(tab_id = %id, "Opened draft template");
        Some(id)
    }

    pub fn close_template(&mut self, template_id: &str) -> CloseOutcome {
        self.tabs.close_tab(template_id)
    }

    pub fn close_others(&mut self, template_id: &str) -> BulkClose {
        self.tabs.close_other_tabs(template_id)
    }

    pub fn close_to_right(&mut self, template_id: &str) -> BulkClose {
        self.tabs.close_tabs_to_right(template_id)
    }

    pub fn close_all(&mut self) -> BulkClose {
        self.tabs.close_all_tabs()
    }

    /// Returns false if the tab is not open
    pub fn mark_dirty(&self, template_id: &str) -> bool {
        if !self.tabs.is_tab_open(template_id) {
            return false;
        }
        if self.dirty.write().insert(template_id.to_string()) {
            tracing::debug!(tab_id = %template_id, "Template has unsaved changes");
        }
        true
    }

    pub fn mark_clean(&self, template_id: &str) -> bool {
        self.dirty.write().remove(template_id)
    }

    pub fn is_dirty(&self, template_id: &str) -> bool {
        self.dirty.read().contains(template_id)
    }

    /// Dirty tabs in display order
    pub fn dirty_tabs(&self) -> Vec<String> {
        let dirty = self.dirty.read();
        self.tabs
            .tab_order()
            .iter()
            .filter(|id| dirty.contains(id.as_str()))
            .cloned()
            .collect()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        !self.dirty.read().is_empty()
    }
}

/// Interceptor installed on the tab manager: the caller's own interceptor
/// first, then confirmation for dirty tabs.
fn close_guard(
    mut inner: Option<TabCloseInterceptor>,
    dirty: DirtySet,
    prompt: Arc<dyn ConfirmPrompt>,
) -> impl FnMut(&str) -> bool + Send + 'static {
    move |id: &str| -> bool {
        if let Some(inner) = inner.as_mut() {
            if !inner(id) {
                return false;
            }
        }

        let is_dirty = dirty.read().contains(id);
        if !is_dirty {
            return true;
        }

        let message = format!("\"{}\" has unsaved changes. Close it anyway?", id);
        if !prompt.confirm(&message) {
            tracing::debug!(tab_id = %id, "Close of dirty template cancelled");
            return false;
        }

        dirty.write().remove(id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use quill_storage::MemoryStore;

    const KEY: &str = "template-editor.tabs";

    fn declining() -> Arc<dyn ConfirmPrompt> {
        Arc::new(|_: &str| false)
    }

    fn accepting() -> Arc<dyn ConfirmPrompt> {
        Arc::new(|_: &str| true)
    }

    fn editor(ids: &[&str], prompt: Arc<dyn ConfirmPrompt>) -> TemplateTabs {
        let mut editor = TemplateTabs::in_memory(TabManagerConfig::new(KEY), prompt);
        for id in ids {
            editor.open_template(id);
        }
        editor
    }

    #[test]
    fn test_clean_tab_closes_without_prompt() {
        let asked = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&asked);
        let prompt: Arc<dyn ConfirmPrompt> = Arc::new(move |_: &str| {
            *counter.lock() += 1;
            false
        });
        let mut editor = editor(&["welcome", "reminder"], prompt);

        assert_eq!(editor.close_template("welcome"), CloseOutcome::Closed);
        assert_eq!(*asked.lock(), 0);
    }

    #[test]
    fn test_dirty_tab_declined() {
        let mut editor = editor(&["welcome", "reminder"], declining());
        assert!(editor.mark_dirty("welcome"));

        assert_eq!(editor.close_template("welcome"), CloseOutcome::Vetoed);
        assert!(editor.tabs().is_tab_open("welcome"));
        assert!(editor.is_dirty("welcome"));
    }

    #[test]
    fn test_dirty_tab_confirmed() {
        let messages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&messages);
        let prompt: Arc<dyn ConfirmPrompt> = Arc::new(move |message: &str| {
            sink.lock().push(message.to_string());
            true
        });
        let mut editor = editor(&["welcome"], prompt);
        editor.mark_dirty("welcome");

        assert_eq!(editor.close_template("welcome"), CloseOutcome::Closed);
        assert!(!editor.is_dirty("welcome"));
        assert!(!editor.has_unsaved_changes());
        assert_eq!(messages.lock().len(), 1);
        assert!(messages.lock()[0].contains("welcome"));
    }

    #[test]
    fn test_bulk_close_keeps_declined_dirty_tabs() {
        let mut editor = editor(&["a", "b", "c", "d"], declining());
        editor.mark_dirty("b");
        editor.mark_dirty("d");

        let report = editor.close_all();
        assert_eq!(report.closed, vec!["a", "c"]);
        assert_eq!(report.vetoed, vec!["b", "d"]);
        assert_eq!(editor.dirty_tabs(), vec!["b", "d"]);
        assert_eq!(editor.tabs().active_tab_id(), Some("d"));
    }

    #[test]
    fn test_close_others_and_to_right() {
        let mut editor = editor(&["a", "b", "c", "d"], declining());
        editor.mark_dirty("d");

        let report = editor.close_to_right("b");
        assert_eq!(report.closed, vec!["c"]);
        assert_eq!(report.vetoed, vec!["d"]);

        let report = editor.close_others("d");
        assert_eq!(report.closed, vec!["a", "b"]);
        assert_eq!(editor.tabs().tab_order(), ["d".to_string()].as_slice());
    }

    #[test]
    fn test_caller_interceptor_runs_first() {
        let config = TabManagerConfig::new(KEY).on_tab_close(|id| id != "pinned");
        let mut editor = TemplateTabs::in_memory(config, accepting());
        editor.open_template("pinned");
        editor.open_template("other");
        editor.mark_dirty("other");

        assert_eq!(editor.close_template("pinned"), CloseOutcome::Vetoed);
        assert_eq!(editor.close_template("other"), CloseOutcome::Closed);
        assert!(!editor.has_unsaved_changes());
    }

    #[test]
    fn test_mark_dirty_requires_open_tab() {
        let editor = editor(&["a"], accepting());

        assert!(!editor.mark_dirty("missing"));
        assert!(!editor.is_dirty("missing"));
        assert!(editor.mark_dirty("a"));
        assert!(editor.mark_clean("a"));
        assert!(!editor.mark_clean("a"));
    }

    #[test]
    fn test_evicted_tab_loses_dirty_flag() {
        let config = TabManagerConfig::new(KEY).max_tabs(Some(2));
        let mut editor = TemplateTabs::in_memory(config, declining());
        editor.open_template("a");
        editor.open_template("b");
        editor.mark_dirty("a");

        // "a" is not active, so eviction does not ask
        assert!(editor.open_template("c"));
        assert!(!editor.tabs().is_tab_open("a"));
        assert!(!editor.is_dirty("a"));
    }

    #[test]
    fn test_dirty_active_tab_blocks_eviction_when_declined() {
        let config = TabManagerConfig::new(KEY).max_tabs(Some(1));
        let mut editor = TemplateTabs::in_memory(config, declining());
        editor.open_template("a");
        editor.mark_dirty("a");

        assert!(!editor.open_template("b"));
        assert_eq!(editor.tabs().tab_order(), ["a".to_string()].as_slice());
    }

    #[test]
    fn test_open_draft() {
        let mut editor = editor(&[], accepting());

        let id = editor.open_draft().unwrap();
        assert!(id.starts_with("draft-"));
        assert_eq!(editor.tabs().active_tab_id(), Some(id.as_str()));
        assert_eq!(
            editor.tabs().tab(&id).unwrap().metadata("draft"),
            Some(&serde_json::Value::Bool(true))
        );
        assert_ne!(editor.open_draft().unwrap(), id);
    }

    #[test]
    fn test_tabs_persist_through_store() {
        let store = MemoryStore::new();
        let mut first = TemplateTabs::new(
            TabManagerConfig::new(KEY),
            Arc::new(store.clone()),
            accepting(),
        );
        first.open_template("welcome");
        first.open_template("reminder");
        first.mark_dirty("welcome");

        let second =
            TemplateTabs::new(TabManagerConfig::new(KEY), Arc::new(store), accepting());
        assert_eq!(second.tabs().tab_order(), first.tabs().tab_order());
        assert_eq!(second.tabs().active_tab_id(), Some("reminder"));
        // Dirty flags belong to the live session only
        assert!(!second.has_unsaved_changes());
    }
}
