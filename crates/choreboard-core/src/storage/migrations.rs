//! Schema migrations.
//!
//! Two layers are versioned independently:
//! - the SQLite schema, tracked in the `schema_version` table and applied
//!   when the database is opened;
//! - the JSON document stored under the `store` key, tracked in
//!   `meta.schema_version` and upgraded one way when the document is loaded.

use rusqlite::{Connection, Result as SqliteResult};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::DatabaseError;
use crate::store::SCHEMA_VERSION;

/// Apply all pending SQLite migrations.
///
/// # Errors
/// Returns an error if a migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;
    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Current SQLite schema version, 0 for a fresh database.
fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            warn!("failed to read schema_version: {e}");
        }
        0
    })
}

/// Migration v1: key-value table holding the document and the dirty queue.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;
    tx.execute("DELETE FROM schema_version", [])?;
    tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [1])?;
    tx.commit()
}

/// Upgrade a stored document to [`SCHEMA_VERSION`] in place.
///
/// Documents without `meta.schema_version` are treated as version 1.
/// Returns the version the document had before the upgrade.
///
/// # Errors
/// Fails on a document written by a newer build, or one that is not a JSON
/// object.
pub fn upgrade_document(doc: &mut Value) -> Result<u32, DatabaseError> {
    let root = doc
        .as_object_mut()
        .ok_or_else(|| DatabaseError::MigrationFailed("document is not an object".into()))?;
    let from = root
        .get("meta")
        .and_then(|m| m.get("schema_version"))
        .and_then(Value::as_u64)
        .map_or(1, |v| v as u32);

    if from > SCHEMA_VERSION {
        return Err(DatabaseError::MigrationFailed(format!(
            "document version {from} is newer than supported version {SCHEMA_VERSION}"
        )));
    }
    if from < 2 {
        for_each_chore(root, upgrade_chore_v2);
    }
    if from < 3 {
        for_each_chore(root, upgrade_chore_v3);
    }

    let meta = root
        .entry("meta")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Some(meta) = meta.as_object_mut() {
        meta.insert("schema_version".into(), SCHEMA_VERSION.into());
    }
    if from < SCHEMA_VERSION {
        info!(from, to = SCHEMA_VERSION, "document upgraded");
    }
    Ok(from)
}

fn for_each_chore(root: &mut Map<String, Value>, upgrade: fn(&mut Map<String, Value>)) {
    let Some(chores) = root.get_mut("chores").and_then(Value::as_object_mut) else {
        return;
    };
    for chore in chores.values_mut().filter_map(Value::as_object_mut) {
        upgrade(chore);
    }
}

/// v1 -> v2: the `shared_chore` flag becomes `completion_criteria`.
fn upgrade_chore_v2(chore: &mut Map<String, Value>) {
    let Some(shared) = chore.remove("shared_chore") else {
        return;
    };
    if chore.contains_key("completion_criteria") {
        return;
    }
    let criteria = if shared.as_bool().unwrap_or(false) {
        "shared"
    } else {
        "independent"
    };
    chore.insert("completion_criteria".into(), criteria.into());
}

/// v2 -> v3: `allow_multiple_claims_per_day` becomes `approval_reset`.
fn upgrade_chore_v3(chore: &mut Map<String, Value>) {
    let Some(multi) = chore.remove("allow_multiple_claims_per_day") else {
        return;
    };
    if chore.contains_key("approval_reset") {
        return;
    }
    let reset = if multi.as_bool().unwrap_or(false) {
        "at_midnight_multi"
    } else {
        "at_midnight_once"
    };
    chore.insert("approval_reset".into(), reset.into());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_migrate_from_scratch() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), 1);
        conn.execute("INSERT INTO kv (key, value) VALUES ('a', 'b')", [])
            .unwrap();
    }

    #[test]
    fn test_migrate_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), 1);
    }

    #[test]
    fn legacy_document_gets_criteria_and_reset_type() {
        let mut doc = json!({
            "chores": {
                "c1": { "id": "c1", "name": "Dishes", "shared_chore": true,
                        "allow_multiple_claims_per_day": true },
                "c2": { "id": "c2", "name": "Bed", "shared_chore": false }
            }
        });
        assert_eq!(upgrade_document(&mut doc).unwrap(), 1);
        assert_eq!(doc["chores"]["c1"]["completion_criteria"], "shared");
        assert_eq!(doc["chores"]["c1"]["approval_reset"], "at_midnight_multi");
        assert!(doc["chores"]["c1"].get("shared_chore").is_none());
        assert_eq!(doc["chores"]["c2"]["completion_criteria"], "independent");
        assert!(doc["chores"]["c2"].get("approval_reset").is_none());
        assert_eq!(doc["meta"]["schema_version"], SCHEMA_VERSION);
    }

    #[test]
    fn v2_document_keeps_existing_criteria() {
        let mut doc = json!({
            "meta": { "schema_version": 2 },
            "chores": {
                "c1": { "completion_criteria": "shared_first",
                        "allow_multiple_claims_per_day": false }
            }
        });
        assert_eq!(upgrade_document(&mut doc).unwrap(), 2);
        assert_eq!(doc["chores"]["c1"]["completion_criteria"], "shared_first");
        assert_eq!(doc["chores"]["c1"]["approval_reset"], "at_midnight_once");
    }

    #[test]
    fn newer_document_is_refused() {
        let mut doc = json!({ "meta": { "schema_version": SCHEMA_VERSION + 1 } });
        assert!(upgrade_document(&mut doc).is_err());
        assert!(upgrade_document(&mut json!([])).is_err());
    }
}
