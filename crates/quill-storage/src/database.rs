//! SQLite-backed store

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

use crate::migrations::run_migrations;
use crate::store::KeyValueStore;
use crate::Result;

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;

        // WAL keeps readers unblocked while the UI thread writes
        let _: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Stored keys starting with `prefix`, sorted
    pub fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        self.with_connection(|conn| {
            let mut stmt =
                conn.prepare("SELECT key FROM kv_store WHERE substr(key, 1, ?1) = ?2 ORDER BY key")?;
            let keys = stmt
                .query_map(
                    rusqlite::params![prefix.chars().count() as i64, prefix],
                    |row| row.get(0),
                )?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(keys)
        })
    }

    /// Remove every key in one transaction, returns how many existed
    pub fn remove_all(&self, keys: &[String]) -> Result<usize> {
        let removed = self.transaction(|conn| {
            let mut stmt = conn.prepare("DELETE FROM kv_store WHERE key = ?1")?;
            let mut removed = 0;
            for key in keys {
                removed += stmt.execute([key])?;
            }
            Ok(removed)
        })?;

        tracing::debug!(requested = keys.len(), removed, "Removed stored values");
        Ok(removed)
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_connection(|conn| {
            let value = conn
                .query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(value)
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let updated_at = Utc::now().to_rfc3339();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![key, value, updated_at],
            )?;
            Ok(())
        })?;

        tracing::trace!(key = %key, bytes = value.len(), "Stored value");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute("DELETE FROM kv_store WHERE key = ?1", [key])?;
            Ok(())
        })
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        db.with_connection(|conn| {
            let count: i32 =
                conn.query_row("SELECT COUNT(*) FROM kv_store", [], |row| row.get(0))?;
            assert_eq!(count, 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_set_overwrites() {
        let db = Database::open_in_memory().unwrap();

        db.set("editor.tabs", "{\"tabOrder\":[]}").unwrap();
        db.set("editor.tabs", "{\"tabOrder\":[\"a\"]}").unwrap();

        assert_eq!(
            db.get("editor.tabs").unwrap().as_deref(),
            Some("{\"tabOrder\":[\"a\"]}")
        );
        assert_eq!(db.keys("").unwrap(), vec!["editor.tabs"]);
    }

    #[test]
    fn test_remove_and_missing_key() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get("missing").unwrap(), None);

        db.set("k", "v").unwrap();
        db.remove("k").unwrap();
        assert_eq!(db.get("k").unwrap(), None);

        // Removing an absent key is not an error
        db.remove("k").unwrap();
    }

    #[test]
    fn test_keys_by_prefix() {
        let db = Database::open_in_memory().unwrap();
        for key in ["editor.tabs", "editor.checkpoints.b", "editor.checkpoints.a", "other"] {
            db.set(key, "{}").unwrap();
        }

        assert_eq!(
            db.keys("editor.checkpoints.").unwrap(),
            vec!["editor.checkpoints.a", "editor.checkpoints.b"]
        );
        assert_eq!(db.keys("").unwrap().len(), 4);
        assert!(db.keys("missing").unwrap().is_empty());
    }

    #[test]
    fn test_remove_all() {
        let db = Database::open_in_memory().unwrap();
        db.set("a", "1").unwrap();
        db.set("b", "2").unwrap();
        db.set("c", "3").unwrap();

        let keys = vec!["a".to_string(), "b".to_string(), "gone".to_string()];
        assert_eq!(db.remove_all(&keys).unwrap(), 2);
        assert_eq!(db.keys("").unwrap(), vec!["c"]);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = Database::open_in_memory().unwrap();
        db.set("kept", "1").unwrap();

        let result: Result<()> = db.transaction(|conn| {
            conn.execute("DELETE FROM kv_store WHERE key = 'kept'", [])?;
            conn.execute("INSERT INTO missing_table VALUES (1)", [])?;
            Ok(())
        });

        assert!(result.is_err());
        assert_eq!(db.get("kept").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn test_clones_share_connection() {
        let db = Database::open_in_memory().unwrap();
        let handle = db.clone();

        db.set("k", "v").unwrap();
        assert_eq!(handle.get("k").unwrap().as_deref(), Some("v"));
    }
}
