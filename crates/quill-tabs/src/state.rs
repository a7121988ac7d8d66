//! Tab state snapshot
//!
//! Stored as JSON under the manager's storage key:
//! ```text
//! { "tabs": [...], "tabOrder": ["a", "b"], "activeTabId": "b" }
//! ```
//! Only `tabOrder` and `activeTabId` are authoritative. Tab records that are
//! missing from `tabs` or do not parse are rebuilt on load.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::tab::Tab;
use crate::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabsState {
    #[serde(default, deserialize_with = "parseable_records")]
    pub(crate) tabs: Vec<Tab>,
    pub(crate) tab_order: Vec<String>,
    #[serde(default)]
    pub(crate) active_tab_id: Option<String>,
}

impl TabsState {
    /// State for a fresh manager: `ids` opened in order, first one active
    pub(crate) fn from_initial(ids: &[String], max_tabs: Option<usize>) -> Self {
        let state = Self {
            tabs: Vec::new(),
            tab_order: ids.to_vec(),
            active_tab_id: None,
        }
        .normalize(max_tabs);

        let active_tab_id = state.tab_order.first().cloned();
        Self {
            active_tab_id,
            ..state
        }
    }

    pub(crate) fn from_json(raw: &str, max_tabs: Option<usize>) -> Result<Self> {
        let state: TabsState = serde_json::from_str(raw)?;
        Ok(state.normalize(max_tabs))
    }

    pub(crate) fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Re-establish the invariants on data we did not produce ourselves
    fn normalize(mut self, max_tabs: Option<usize>) -> Self {
        let mut seen = HashSet::new();
        self.tab_order.retain(|id| seen.insert(id.clone()));

        let mut trimmed = Vec::new();
        if let Some(max) = max_tabs {
            if self.tab_order.len() > max {
                let excess = self.tab_order.len() - max;
                trimmed = self.tab_order.drain(..excess).collect();
            }
        }

        let mut records: HashMap<String, Tab> = self
            .tabs
            .drain(..)
            .map(|tab| (tab.id.clone(), tab))
            .collect();
        self.tabs = self
            .tab_order
            .iter()
            .map(|id| records.remove(id).unwrap_or_else(|| Tab::new(id.clone())))
            .collect();

        // A selection trimmed off the front moves to its nearest survivor
        if let Some(active) = self.active_tab_id.take() {
            self.active_tab_id = if self.tab_order.contains(&active) {
                Some(active)
            } else if trimmed.contains(&active) {
                self.tab_order.first().cloned()
            } else {
                None
            };
        }

        self
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn tab_order(&self) -> &[String] {
        &self.tab_order
    }

    pub fn active_tab_id(&self) -> Option<&str> {
        self.active_tab_id.as_deref()
    }

    pub fn tab(&self, id: &str) -> Option<&Tab> {
        self.tabs.iter().find(|tab| tab.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tab_order.iter().any(|open| open == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.tab_order.iter().position(|open| open == id)
    }

    pub fn len(&self) -> usize {
        self.tab_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tab_order.is_empty()
    }

    pub(crate) fn tab_mut(&mut self, id: &str) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|tab| tab.id == id)
    }

    pub(crate) fn push(&mut self, tab: Tab) {
        self.tab_order.push(tab.id.clone());
        self.tabs.push(tab);
    }

    /// Drops the id and its record. Does not touch the active selection.
    pub(crate) fn remove(&mut self, id: &str) -> bool {
        match self.position(id) {
            Some(index) => {
                self.remove_at(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove_at(&mut self, index: usize) -> String {
        let id = self.tab_order.remove(index);
        self.tabs.retain(|tab| tab.id != id);
        id
    }
}

/// Records that fail to parse are skipped
fn parseable_records<'de, D>(deserializer: D) -> std::result::Result<Vec<Tab>, D::Error>
where
    D: Deserializer<'de>,
{
    let records = match Value::deserialize(deserializer)? {
        Value::Array(records) => records,
        _ => Vec::new(),
    };
    Ok(records
        .into_iter()
        .filter_map(|record| serde_json::from_value(record).ok())
        .collect())
}
