//! Template checkpoints
//!
//! A bounded history of named snapshots of a template's fields. Restoring
//! does not overwrite anything itself: it returns the field changes that turn
//! the current fields back into the snapshot, so the editor can apply them
//! through its own update path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use uuid::Uuid;

use crate::error::EditorError;
use crate::Result;

/// Template field name to value (subject, body, preheader, ...)
pub type TemplateFields = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub id: String,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub fields: TemplateFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum FieldChange {
    Set { field: String, value: Value },
    Remove { field: String },
}

impl FieldChange {
    pub fn field(&self) -> &str {
        match self {
            FieldChange::Set { field, .. } | FieldChange::Remove { field } => field,
        }
    }

    pub fn apply(&self, fields: &mut TemplateFields) {
        match self {
            FieldChange::Set { field, value } => {
                fields.insert(field.clone(), value.clone());
            }
            FieldChange::Remove { field } => {
                fields.remove(field);
            }
        }
    }
}

pub fn apply_changes(fields: &mut TemplateFields, changes: &[FieldChange]) {
    for change in changes {
        change.apply(fields);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointHistory {
    max_entries: usize,
    /// Oldest first
    entries: VecDeque<Checkpoint>,
}

impl CheckpointHistory {
    pub const DEFAULT_MAX_ENTRIES: usize = 20;

    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Change the bound, dropping the oldest entries that no longer fit
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self.trim();
        self
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let mut history: CheckpointHistory = serde_json::from_str(raw)?;
        history.max_entries = history.max_entries.max(1);
        history.trim();
        Ok(history)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Record a snapshot, dropping the oldest ones beyond the bound.
    ///
    /// Fields identical to the latest checkpoint are not recorded again;
    /// the latest checkpoint is returned instead.
    pub fn record(&mut self, label: impl Into<String>, fields: TemplateFields) -> &Checkpoint {
        let unchanged = self
            .entries
            .back()
            .is_some_and(|latest| latest.fields == fields);

        if !unchanged {
            let checkpoint = Checkpoint {
                id: Uuid::new_v4().to_string(),
                label: label.into(),
                created_at: Utc::now(),
                fields,
            };
            tracing::debug!(
                checkpoint_id = %checkpoint.id,
                label = %checkpoint.label,
                "Recorded checkpoint"
            );

            self.entries.push_back(checkpoint);
            self.trim();
        }

        &self.entries[self.entries.len() - 1]
    }

    /// Field changes that turn `current` into the checkpoint's fields,
    /// sorted by field name
    pub fn restore(
        &self,
        checkpoint_id: &str,
        current: &TemplateFields,
    ) -> Result<Vec<FieldChange>> {
        let checkpoint = self
            .get(checkpoint_id)
            .ok_or_else(|| EditorError::CheckpointNotFound(checkpoint_id.to_string()))?;

        Ok(diff_fields(current, &checkpoint.fields))
    }

    pub fn latest(&self) -> Option<&Checkpoint> {
        self.entries.back()
    }

    pub fn get(&self, checkpoint_id: &str) -> Option<&Checkpoint> {
        self.entries.iter().find(|c| c.id == checkpoint_id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &Checkpoint> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn trim(&mut self) {
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }
}

impl Default for CheckpointHistory {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ENTRIES)
    }
}

fn diff_fields(from: &TemplateFields, to: &TemplateFields) -> Vec<FieldChange> {
    let mut changes: Vec<FieldChange> = to
        .iter()
        .filter(|(field, value)| from.get(*field) != Some(*value))
        .map(|(field, value)| FieldChange::Set {
            field: field.clone(),
            value: value.clone(),
        })
        .collect();

    changes.extend(
        from.keys()
            .filter(|field| !to.contains_key(*field))
            .map(|field| FieldChange::Remove {
                field: field.clone(),
            }),
    );

    changes.sort_by(|a, b| a.field().cmp(b.field()));
    changes
}
