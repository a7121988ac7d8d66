//! Composer configuration

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use quill_editor::CheckpointHistory;
use quill_tabs::TabManagerConfig;

use crate::error::CoreError;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the database file
    pub database_path: PathBuf,
    /// Key the open tab state is stored under
    pub storage_key: String,
    /// Restore open tabs on the next launch
    pub persist_tabs: bool,
    /// Open tab limit, `None` for unlimited
    pub max_tabs: Option<usize>,
    /// Checkpoints kept per template
    pub max_checkpoints: usize,
}

impl Config {
    pub const DEFAULT_STORAGE_KEY: &'static str = "quill.template-tabs";

    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join("quill.db"),
            storage_key: Self::DEFAULT_STORAGE_KEY.to_string(),
            persist_tabs: true,
            max_tabs: Some(10),
            max_checkpoints: CheckpointHistory::DEFAULT_MAX_ENTRIES,
        }
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("Quill"))
            .unwrap_or_else(|| PathBuf::from(".quill"))
    }

    /// Read a JSON config file. A missing file yields the defaults, missing
    /// fields take their default values.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage_key.trim().is_empty() {
            return Err(CoreError::Config("storage_key cannot be empty".to_string()));
        }
        if self.max_tabs == Some(0) {
            return Err(CoreError::Config(
                "max_tabs must be positive, use null for unlimited".to_string(),
            ));
        }
        Ok(())
    }

    /// Tab manager settings derived from this config
    pub fn tab_manager_config(&self) -> TabManagerConfig {
        TabManagerConfig::new(self.storage_key.clone())
            .persist(self.persist_tabs)
            .max_tabs(self.max_tabs)
    }

    /// Storage key for a template's checkpoint history
    pub fn checkpoint_key(&self, template_id: &str) -> String {
        format!("{}.checkpoints.{}", self.storage_key, template_id)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

// Platform data directory lookup
mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("quill-config-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn test_new_config() {
        let config = Config::new(PathBuf::from("/data"));
        assert_eq!(config.database_path, PathBuf::from("/data/quill.db"));
        assert_eq!(config.storage_key, Config::DEFAULT_STORAGE_KEY);
        assert!(config.persist_tabs);
        assert_eq!(config.max_tabs, Some(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = Config::load(temp_path("missing.json")).unwrap();
        assert_eq!(config.storage_key, Config::DEFAULT_STORAGE_KEY);
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path("config.json");
        let mut config = Config::new(PathBuf::from("/data"));
        config.max_tabs = None;
        config.persist_tabs = false;

        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);

        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_partial_file_takes_defaults() {
        let path = temp_path("partial.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{"max_tabs": 3}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.max_tabs, Some(3));
        assert_eq!(config.storage_key, Config::DEFAULT_STORAGE_KEY);
        assert_eq!(config.max_checkpoints, CheckpointHistory::DEFAULT_MAX_ENTRIES);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let path = temp_path("invalid.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{"storage_key": "  "}"#).unwrap();

        assert!(matches!(Config::load(&path), Err(CoreError::Config(_))));

        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(CoreError::Serialization(_))
        ));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_tab_manager_config() {
        let mut config = Config::new(PathBuf::from("/data"));
        config.persist_tabs = false;

        let tabs = config.tab_manager_config();
        assert_eq!(tabs.storage_key(), Config::DEFAULT_STORAGE_KEY);
        assert!(!tabs.is_persistent());
        assert_eq!(
            config.checkpoint_key("welcome"),
            "quill.template-tabs.checkpoints.welcome"
        );
    }
}
