//! Tab Manager
//!
//! Owns the ordered tab set and its active selection. Every committed change
//! is persisted (when enabled), then reported to the active-tab observer and
//! to state listeners, synchronously and in call order.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use quill_storage::KeyValueStore;

use crate::config::{TabChangeObserver, TabCloseInterceptor, TabManagerConfig};
use crate::state::TabsState;
use crate::tab::Tab;
use crate::Result;

/// Receives the full state after each committed change
pub type StateListener = Box<dyn FnMut(&TabsState) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    /// The close interceptor kept the tab open
    Vetoed,
    NotOpen,
}

/// Result of closing several tabs at once, in the order they were considered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkClose {
    pub closed: Vec<String>,
    pub vetoed: Vec<String>,
}

impl BulkClose {
    pub fn is_complete(&self) -> bool {
        self.vetoed.is_empty()
    }
}

struct Hooks {
    on_tab_change: Option<TabChangeObserver>,
    on_tab_close: Option<TabCloseInterceptor>,
    listeners: Vec<(SubscriptionId, StateListener)>,
    next_subscription: u64,
}

pub struct TabManager {
    state: TabsState,
    storage_key: String,
    /// `None` when persistence is disabled
    store: Option<Arc<dyn KeyValueStore>>,
    max_tabs: Option<usize>,
    hooks: Hooks,
}

impl TabManager {
    /// Build a manager, adopting whatever state is stored under the key.
    ///
    /// Missing or unreadable stored state falls back to the configured
    /// initial tabs.
    pub fn new(config: TabManagerConfig, store: Arc<dyn KeyValueStore>) -> Self {
        let store = config.persist.then_some(store);
        Self::build(config, store)
    }

    /// A manager that never reads or writes storage
    pub fn in_memory(config: TabManagerConfig) -> Self {
        Self::build(config, None)
    }

    fn build(config: TabManagerConfig, store: Option<Arc<dyn KeyValueStore>>) -> Self {
        let TabManagerConfig {
            storage_key,
            max_tabs,
            on_tab_change,
            on_tab_close,
            initial_tabs,
            ..
        } = config;

        let restored = store
            .as_deref()
            .and_then(|store| load_state(store, &storage_key, max_tabs));
        let from_storage = restored.is_some();
        let state = restored.unwrap_or_else(|| TabsState::from_initial(&initial_tabs, max_tabs));

        tracing::debug!(
            storage_key = %storage_key,
            tab_count = state.len(),
            from_storage,
            "Initialized tab manager"
        );

        Self {
            state,
            storage_key,
            store,
            max_tabs,
            hooks: Hooks {
                on_tab_change,
                on_tab_close,
                listeners: Vec::new(),
                next_subscription: 0,
            },
        }
    }

    pub fn state(&self) -> &TabsState {
        &self.state
    }

    pub fn tab_order(&self) -> &[String] {
        self.state.tab_order()
    }

    pub fn active_tab_id(&self) -> Option<&str> {
        self.state.active_tab_id()
    }

    pub fn tab(&self, id: &str) -> Option<&Tab> {
        self.state.tab(id)
    }

    pub fn is_tab_open(&self, id: &str) -> bool {
        self.state.contains(id)
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    pub fn max_tabs(&self) -> Option<usize> {
        self.max_tabs
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    /// Open `id` (or focus it if already open) and make it active.
    ///
    /// At capacity the first tab in display order is evicted. The close
    /// interceptor is only consulted when that tab is the active one; a veto
    /// cancels the whole open and `false` is returned.
    pub fn open_tab(&mut self, id: &str) -> bool {
        if self.state.contains(id) {
            self.set_active_tab(id);
            return true;
        }

        let previous = self.state.active_tab_id.clone();

        if let Some(max) = self.max_tabs {
            if self.state.len() >= max {
                if let Some(oldest) = self.state.tab_order.first().cloned() {
                    let evicting_active = previous.as_deref() == Some(oldest.as_str());
                    if evicting_active && !self.allow_close(&oldest) {
                        tracing::debug!(
                            tab_id = %id,
                            evicted = %oldest,
                            "Open cancelled, eviction of active tab vetoed"
                        );
                        return false;
                    }
                    self.state.remove(&oldest);
                    tracing::debug!(tab_id = %oldest, max_tabs = max, "Evicted oldest tab");
                }
            }
        }

        self.state.push(Tab::new(id));
        self.state.active_tab_id = Some(id.to_string());

        tracing::debug!(tab_id = %id, tab_count = self.state.len(), "Opened tab");

        self.commit(previous);
        true
    }

    /// Close `id`. When it was active, selection moves to its right
    /// neighbor, else its left neighbor, else nothing.
    pub fn close_tab(&mut self, id: &str) -> CloseOutcome {
        let Some(index) = self.state.position(id) else {
            return CloseOutcome::NotOpen;
        };

        if !self.allow_close(id) {
            tracing::debug!(tab_id = %id, "Close vetoed");
            return CloseOutcome::Vetoed;
        }

        let previous = self.state.active_tab_id.clone();
        self.state.remove_at(index);

        if previous.as_deref() == Some(id) {
            let order = &self.state.tab_order;
            let next = order
                .get(index)
                .or_else(|| index.checked_sub(1).and_then(|left| order.get(left)))
                .cloned();
            self.state.active_tab_id = next;
        }

        tracing::debug!(tab_id = %id, "Closed tab");

        self.commit(previous);
        CloseOutcome::Closed
    }

    /// Returns false if `id` is not open
    pub fn set_active_tab(&mut self, id: &str) -> bool {
        if !self.state.contains(id) {
            return false;
        }
        if self.state.active_tab_id() == Some(id) {
            return true;
        }

        let previous = self.state.active_tab_id.replace(id.to_string());
        self.commit(previous);
        true
    }

    /// Move the tab at `from` to `to`. Both indices are clamped to the open
    /// range. Returns true if the order changed.
    pub fn reorder_tabs(&mut self, from: usize, to: usize) -> bool {
        let Some(last) = self.state.len().checked_sub(1) else {
            return false;
        };

        let from = from.min(last);
        let to = to.min(last);
        if from == to {
            return false;
        }

        let id = self.state.tab_order.remove(from);
        self.state.tab_order.insert(to, id);

        let previous = self.state.active_tab_id.clone();
        self.commit(previous);
        true
    }

    /// Close every tab except `id`, which becomes active. Vetoed tabs stay.
    pub fn close_other_tabs(&mut self, id: &str) -> BulkClose {
        if !self.state.contains(id) {
            return BulkClose::default();
        }

        let previous = self.state.active_tab_id.clone();
        let candidates: Vec<String> = self
            .state
            .tab_order
            .iter()
            .filter(|open| *open != id)
            .cloned()
            .collect();

        let report = self.close_candidates(candidates);
        self.state.active_tab_id = Some(id.to_string());

        if !report.closed.is_empty() || self.state.active_tab_id != previous {
            self.commit(previous);
        }
        report
    }

    /// Close every tab positioned after `id`. Vetoed tabs stay.
    pub fn close_tabs_to_right(&mut self, id: &str) -> BulkClose {
        let Some(index) = self.state.position(id) else {
            return BulkClose::default();
        };

        let original = self.state.tab_order.clone();
        let candidates = original[index + 1..].to_vec();
        self.finish_bulk_close(original, candidates)
    }

    /// Close every tab. Only tabs whose close was vetoed remain.
    pub fn close_all_tabs(&mut self) -> BulkClose {
        let original = self.state.tab_order.clone();
        let candidates = original.clone();
        self.finish_bulk_close(original, candidates)
    }

    /// Activate the tab after the active one, wrapping around
    pub fn activate_next_tab(&mut self) -> bool {
        let target = match self.active_index() {
            Some(index) => self.state.tab_order.get((index + 1) % self.state.len()),
            None => self.state.tab_order.first(),
        };
        match target.cloned() {
            Some(id) => self.set_active_tab(&id),
            None => false,
        }
    }

    /// Activate the tab before the active one, wrapping around
    pub fn activate_previous_tab(&mut self) -> bool {
        let target = match self.active_index() {
            Some(0) | None => self.state.tab_order.last(),
            Some(index) => self.state.tab_order.get(index - 1),
        };
        match target.cloned() {
            Some(id) => self.set_active_tab(&id),
            None => false,
        }
    }

    /// Returns false if `id` is not open or the value was already stored
    pub fn set_tab_metadata(&mut self, id: &str, key: &str, value: Value) -> bool {
        let changed = match self.state.tab_mut(id) {
            Some(tab) => tab.set_metadata(key, value),
            None => false,
        };
        if changed {
            let previous = self.state.active_tab_id.clone();
            self.commit(previous);
        }
        changed
    }

    pub fn remove_tab_metadata(&mut self, id: &str, key: &str) -> Option<Value> {
        let removed = self.state.tab_mut(id)?.remove_metadata(key)?;
        let previous = self.state.active_tab_id.clone();
        self.commit(previous);
        Some(removed)
    }

    /// Register a listener called after every committed change
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&TabsState) + Send + 'static,
    {
        let id = SubscriptionId(self.hooks.next_subscription);
        self.hooks.next_subscription += 1;
        self.hooks.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.hooks.listeners.len();
        self.hooks.listeners.retain(|(existing, _)| *existing != id);
        self.hooks.listeners.len() != before
    }

    /// Delete the stored state. The in-memory state is left as is.
    pub fn clear_persisted(&self) {
        let Some(store) = self.store.as_deref() else {
            return;
        };
        if let Err(e) = store.remove(&self.storage_key) {
            tracing::warn!(
                storage_key = %self.storage_key,
                error = %e,
                "Failed to clear persisted tab state"
            );
        }
    }

    fn active_index(&self) -> Option<usize> {
        self.state
            .active_tab_id()
            .and_then(|active| self.state.position(active))
    }

    fn allow_close(&mut self, id: &str) -> bool {
        match self.hooks.on_tab_close.as_mut() {
            Some(interceptor) => interceptor(id),
            None => true,
        }
    }

    fn close_candidates(&mut self, candidates: Vec<String>) -> BulkClose {
        let mut report = BulkClose::default();
        for id in candidates {
            if self.allow_close(&id) {
                self.state.remove(&id);
                report.closed.push(id);
            } else {
                report.vetoed.push(id);
            }
        }

        tracing::debug!(
            closed = report.closed.len(),
            vetoed = report.vetoed.len(),
            "Closed tabs"
        );
        report
    }

    fn finish_bulk_close(&mut self, original: Vec<String>, candidates: Vec<String>) -> BulkClose {
        let previous = self.state.active_tab_id.clone();
        let report = self.close_candidates(candidates);

        if report.closed.is_empty() {
            return report;
        }

        self.reselect_after_bulk_close(&original);
        self.commit(previous);
        report
    }

    /// If the active tab was closed, select the nearest surviving tab to its
    /// right in `original`, else to its left.
    fn reselect_after_bulk_close(&mut self, original: &[String]) {
        let Some(active) = self.state.active_tab_id.clone() else {
            return;
        };
        if self.state.contains(&active) {
            return;
        }

        let Some(index) = original.iter().position(|id| *id == active) else {
            self.state.active_tab_id = None;
            return;
        };

        let next = original[index + 1..]
            .iter()
            .find(|id| self.state.contains(id))
            .or_else(|| {
                original[..index]
                    .iter()
                    .rev()
                    .find(|id| self.state.contains(id))
            })
            .cloned();
        self.state.active_tab_id = next;
    }

    fn commit(&mut self, previous_active: Option<String>) {
        self.persist();

        if self.state.active_tab_id != previous_active {
            if let Some(observer) = self.hooks.on_tab_change.as_mut() {
                observer(self.state.active_tab_id.as_deref());
            }
        }

        for (_, listener) in self.hooks.listeners.iter_mut() {
            listener(&self.state);
        }
    }

    fn persist(&self) {
        let Some(store) = self.store.as_deref() else {
            return;
        };
        if let Err(e) = self.write_state(store) {
            tracing::warn!(
                storage_key = %self.storage_key,
                error = %e,
                "Failed to persist tab state"
            );
        }
    }

    fn write_state(&self, store: &dyn KeyValueStore) -> Result<()> {
        let json = self.state.to_json()?;
        store.set(&self.storage_key, &json)?;
        Ok(())
    }
}

impl fmt::Debug for TabManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabManager")
            .field("storage_key", &self.storage_key)
            .field("state", &self.state)
            .field("max_tabs", &self.max_tabs)
            .field("persistent", &self.store.is_some())
            .field("listeners", &self.hooks.listeners.len())
            .finish()
    }
}

fn load_state(
    store: &dyn KeyValueStore,
    storage_key: &str,
    max_tabs: Option<usize>,
) -> Option<TabsState> {
    match read_state(store, storage_key, max_tabs) {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!(
                storage_key = %storage_key,
                error = %e,
                "Ignoring unreadable tab state"
            );
            None
        }
    }
}

fn read_state(
    store: &dyn KeyValueStore,
    storage_key: &str,
    max_tabs: Option<usize>,
) -> Result<Option<TabsState>> {
    let Some(raw) = store.get(storage_key)? else {
        return Ok(None);
    };
    Ok(Some(TabsState::from_json(&raw, max_tabs)?))
}
