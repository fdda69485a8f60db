//! Marking and meta storage implementations

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::models::Marking;

/// Trait for marking storage operations
pub trait MarkingStore {
    /// Load the full collection, newest creation first
    fn load_all(&self) -> Result<Vec<Marking>>;

    /// Atomically replace the full collection with a merged one
    fn replace_all(&self, markings: &[Marking]) -> Result<()>;

    /// Insert or update a single marking by identity key
    fn upsert(&self, marking: &Marking) -> Result<()>;

    /// Delete a marking by identity key; returns false when absent
    fn delete(&self, identity_key: &str) -> Result<bool>;

    /// Number of stored markings
    fn count(&self) -> Result<usize>;
}

/// Trait for local key/value state (device identity, sync bookkeeping)
pub trait MetaStore {
    /// Read a value, `None` when unset
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// `SQLite` implementation of `MarkingStore`
pub struct SqliteMarkingStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteMarkingStore<'a> {
    /// Create a new store with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn insert_row(conn: &Connection, marking: &Marking) -> Result<()> {
        let payload = serde_json::to_string(marking)?;
        conn.execute(
            "INSERT OR REPLACE INTO markings (identity_key, payload, timestamp, last_modified)
             VALUES (?, ?, ?, ?)",
            params![
                marking.identity_key(),
                payload,
                marking.timestamp.unwrap_or(0),
                marking.effective_modified()
            ],
        )?;
        Ok(())
    }

    fn parse_row(payload: &str) -> Option<Marking> {
        match serde_json::from_str(payload) {
            Ok(marking) => Some(marking),
            Err(error) => {
                // A bad row must not take the rest of the collection with it.
                tracing::warn!(%error, "Skipping unreadable marking row");
                None
            }
        }
    }
}

impl MarkingStore for SqliteMarkingStore<'_> {
    fn load_all(&self) -> Result<Vec<Marking>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM markings ORDER BY timestamp DESC")?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        Ok(rows
            .iter()
            .filter_map(|payload| Self::parse_row(payload))
            .collect())
    }

    fn replace_all(&self, markings: &[Marking]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM markings", [])?;
        for marking in markings {
            Self::insert_row(&tx, marking)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn upsert(&self, marking: &Marking) -> Result<()> {
        Self::insert_row(self.conn, marking)
    }

    fn delete(&self, identity_key: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM markings WHERE identity_key = ?",
            params![identity_key],
        )?;
        Ok(rows > 0)
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM markings", [], |row| row.get(0))?;
        usize::try_from(count).map_err(|_| Error::Database("Negative row count".to_string()))
    }
}

/// `SQLite` implementation of `MetaStore`
pub struct SqliteMetaStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteMetaStore<'a> {
    /// Create a new store with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl MetaStore for SqliteMetaStore<'_> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = ?", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::Database;
    use crate::models::MarkingProperties;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn sample(work_order: &str) -> Marking {
        let properties = MarkingProperties {
            work_order: Some(work_order.to_string()),
            ..MarkingProperties::default()
        };
        Marking::new_marker(35.0, 139.0, properties, "dev-1")
    }

    #[test]
    fn test_upsert_and_load() {
        let db = setup();
        let store = SqliteMarkingStore::new(db.connection());

        let marking = sample("WO-1");
        store.upsert(&marking).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded, vec![marking]);
    }

    #[test]
    fn test_upsert_replaces_by_identity_key() {
        let db = setup();
        let store = SqliteMarkingStore::new(db.connection());

        let mut marking = sample("WO-1");
        store.upsert(&marking).unwrap();

        marking.properties.description = Some("revised".to_string());
        marking.touch("dev-2");
        store.upsert(&marking).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].properties.description.as_deref(), Some("revised"));
        assert_eq!(loaded[0].device_id.as_deref(), Some("dev-2"));
    }

    #[test]
    fn test_replace_all_swaps_collection() {
        let db = setup();
        let store = SqliteMarkingStore::new(db.connection());

        store.upsert(&sample("WO-1")).unwrap();
        store.upsert(&sample("WO-2")).unwrap();

        let replacement = vec![sample("WO-3")];
        store.replace_all(&replacement).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded, replacement);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_replace_all_empty_clears() {
        let db = setup();
        let store = SqliteMarkingStore::new(db.connection());

        store.upsert(&sample("WO-1")).unwrap();
        store.replace_all(&[]).unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_delete() {
        let db = setup();
        let store = SqliteMarkingStore::new(db.connection());

        let marking = sample("WO-1");
        store.upsert(&marking).unwrap();

        assert!(store.delete(&marking.identity_key()).unwrap());
        assert!(!store.delete(&marking.identity_key()).unwrap());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_load_all_orders_newest_first() {
        let db = setup();
        let store = SqliteMarkingStore::new(db.connection());

        let mut old = sample("WO-1");
        old.timestamp = Some(100);
        let mut new = sample("WO-2");
        new.timestamp = Some(300);

        store.upsert(&old).unwrap();
        store.upsert(&new).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded[0].timestamp, Some(300));
        assert_eq!(loaded[1].timestamp, Some(100));
    }

    #[test]
    fn test_meta_round_trip() {
        let db = setup();
        let meta = SqliteMetaStore::new(db.connection());

        assert_eq!(meta.get("device_id").unwrap(), None);
        meta.set("device_id", "dev-abc").unwrap();
        assert_eq!(meta.get("device_id").unwrap(), Some("dev-abc".to_string()));

        meta.set("device_id", "dev-def").unwrap();
        assert_eq!(meta.get("device_id").unwrap(), Some("dev-def".to_string()));
    }
}
