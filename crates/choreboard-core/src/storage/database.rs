//! SQLite-backed persistence.
//!
//! Everything lives in one `kv` table:
//! - `store`: the JSON document of every entity
//! - `gamification_dirty`: the pending gamification queue

use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{data_dir, migrations};
use crate::error::{DatabaseError, Result};
use crate::store::Store;

pub const STORE_KEY: &str = "store";
pub const DIRTY_QUEUE_KEY: &str = "gamification_dirty";

/// SQLite database holding the persisted document.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/choreboard/choreboard.db`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("choreboard.db");
        Self::open_at(&path)
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        debug!(path = %path.display(), "database opened");
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|source| DatabaseError::OpenFailed {
                path: PathBuf::from(":memory:"),
                source,
            })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        migrations::migrate(&self.conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        match stmt.query_row(params![key], |row| row.get::<_, String>(0)) {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.kv_get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn save_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.kv_set(key, &serde_json::to_string(value)?)?;
        Ok(())
    }

    /// Load the document, upgrading older schema versions first.
    /// `None` on a fresh database.
    pub fn load_store(&self) -> Result<Option<Store>> {
        let Some(mut doc) = self.load_json::<serde_json::Value>(STORE_KEY)? else {
            return Ok(None);
        };
        let from = migrations::upgrade_document(&mut doc)?;
        let store: Store = serde_json::from_value(doc)?;
        if from < store.meta.schema_version {
            self.save_store(&store)?;
        }
        Ok(Some(store))
    }

    pub fn save_store(&self, store: &Store) -> Result<()> {
        self.save_json(STORE_KEY, store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Chore, CompletionCriteria, Kid};

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
    }

    #[test]
    fn store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("choreboard.db");
        let kid_id = {
            let db = Database::open_at(&path).unwrap();
            let mut store = Store::new();
            let kid_id = store.add_kid(Kid::new("Ava"));
            db.save_store(&store).unwrap();
            kid_id
        };

        let db = Database::open_at(&path).unwrap();
        let store = db.load_store().unwrap().unwrap();
        assert_eq!(store.kid(&kid_id).unwrap().name, "Ava");
    }

    #[test]
    fn legacy_document_is_upgraded_on_load() {
        let db = Database::open_memory().unwrap();
        let mut chore = serde_json::to_value(Chore::new("Dishes", 5.0)).unwrap();
        let fields = chore.as_object_mut().unwrap();
        fields.remove("completion_criteria");
        fields.remove("approval_reset");
        fields.insert("shared_chore".into(), true.into());
        let id = fields["id"].as_str().unwrap().to_string();
        let mut chores = serde_json::Map::new();
        chores.insert(id.clone(), chore);
        let doc = serde_json::json!({ "chores": chores });
        db.kv_set(STORE_KEY, &doc.to_string()).unwrap();

        let store = db.load_store().unwrap().unwrap();
        assert_eq!(
            store.chore(&id).unwrap().completion_criteria,
            CompletionCriteria::Shared
        );
        let raw = db.kv_get(STORE_KEY).unwrap().unwrap();
        assert!(!raw.contains("shared_chore"));
    }

    #[test]
    fn fresh_database_has_no_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.load_store().unwrap().is_none());
    }
}
