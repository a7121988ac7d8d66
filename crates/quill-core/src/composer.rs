//! Template composer state container
//!
//! Owns the database, the open template tabs and the per-template
//! checkpoint histories. Tab state and checkpoints share one store.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use quill_editor::{
    Checkpoint, CheckpointHistory, ConfirmPrompt, FieldChange, TemplateFields, TemplateTabs,
};
use quill_storage::{Database, KeyValueStore};

use crate::config::Config;
use crate::Result;

pub struct Composer {
    config: Config,
    db: Database,
    tabs: TemplateTabs,
    /// Histories loaded so far, keyed by template id
    checkpoints: HashMap<String, CheckpointHistory>,
}

impl Composer {
    pub fn new(config: Config, prompt: Arc<dyn ConfirmPrompt>) -> Result<Self> {
        config.validate()?;

        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::open(&config.database_path)?;

        tracing::info!(
            database = %config.database_path.display(),
            "Opened composer database"
        );

        Ok(Self::with_database(config, db, prompt))
    }

    pub fn in_memory(config: Config, prompt: Arc<dyn ConfirmPrompt>) -> Result<Self> {
        config.validate()?;
        let db = Database::open_in_memory()?;
        Ok(Self::with_database(config, db, prompt))
    }

    fn with_database(config: Config, db: Database, prompt: Arc<dyn ConfirmPrompt>) -> Self {
        let tabs = TemplateTabs::new(config.tab_manager_config(), Arc::new(db.clone()), prompt);

        tracing::info!(
            tab_count = tabs.tabs().len(),
            active_tab = ?tabs.tabs().active_tab_id(),
            "Initialized composer"
        );

        Self {
            config,
            db,
            tabs,
            checkpoints: HashMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn tabs(&self) -> &TemplateTabs {
        &self.tabs
    }

    pub fn tabs_mut(&mut self) -> &mut TemplateTabs {
        &mut self.tabs
    }

    /// Snapshot a template's fields and persist the history
    pub fn record_checkpoint(
        &mut self,
        template_id: &str,
        label: &str,
        fields: TemplateFields,
    ) -> Result<Checkpoint> {
        let checkpoint = self.history_mut(template_id)?.record(label, fields).clone();
        self.save_history(template_id)?;
        Ok(checkpoint)
    }

    pub fn checkpoints(&mut self, template_id: &str) -> Result<&CheckpointHistory> {
        let history = self.history_mut(template_id)?;
        Ok(&*history)
    }

    /// Changes that bring `current` back to the given checkpoint
    pub fn restore_checkpoint(
        &mut self,
        template_id: &str,
        checkpoint_id: &str,
        current: &TemplateFields,
    ) -> Result<Vec<FieldChange>> {
        let changes = self
            .history_mut(template_id)?
            .restore(checkpoint_id, current)?;

        tracing::info!(
            template_id = %template_id,
            checkpoint_id = %checkpoint_id,
            changes = changes.len(),
            "Restoring checkpoint"
        );
        Ok(changes)
    }

    pub fn discard_checkpoints(&mut self, template_id: &str) -> Result<()> {
        self.checkpoints.remove(template_id);
        self.db.remove(&self.config.checkpoint_key(template_id))?;
        Ok(())
    }

    /// Templates with a stored checkpoint history, sorted
    pub fn checkpointed_templates(&self) -> Result<Vec<String>> {
        let prefix = self.config.checkpoint_key("");
        let templates = self
            .db
            .keys(&prefix)?
            .into_iter()
            .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
            .collect();
        Ok(templates)
    }

    /// Drop every stored checkpoint history at once. Tab state is kept.
    pub fn discard_all_checkpoints(&mut self) -> Result<usize> {
        let keys = self.db.keys(&self.config.checkpoint_key(""))?;
        let removed = self.db.remove_all(&keys)?;
        self.checkpoints.clear();

        tracing::info!(histories = removed, "Discarded all checkpoints");
        Ok(removed)
    }

    fn history_mut(&mut self, template_id: &str) -> Result<&mut CheckpointHistory> {
        match self.checkpoints.entry(template_id.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let history = load_history(&self.db, &self.config, template_id)?;
                Ok(entry.insert(history))
            }
        }
    }

    fn save_history(&self, template_id: &str) -> Result<()> {
        if let Some(history) = self.checkpoints.get(template_id) {
            let key = self.config.checkpoint_key(template_id);
            self.db.set(&key, &history.to_json()?)?;
        }
        Ok(())
    }
}

fn load_history(db: &Database, config: &Config, template_id: &str) -> Result<CheckpointHistory> {
    let history = match db.get(&config.checkpoint_key(template_id))? {
        Some(raw) => CheckpointHistory::from_json(&raw)?.with_max_entries(config.max_checkpoints),
        None => CheckpointHistory::new(config.max_checkpoints),
    };
    Ok(history)
}
