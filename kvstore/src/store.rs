use std::fs;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::error::Result;
use crate::pubsub::{Publication, Publisher};
use crate::record::{Record, record_key};

const DB_FILE: &str = "store.db";
const PUBSUB_CAPACITY: usize = 256;

/// SQLite-backed key/value store
///
/// Not `Sync`: one owner (usually an actor task) serializes all access.
pub struct Store {
    conn: Connection,
    publisher: Publisher,
}

impl Store {
    /// Open (or create) a store in `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        debug!(?dir, "Store::open: called");
        fs::create_dir_all(dir)?;
        let conn = Connection::open(dir.join(DB_FILE))?;
        let store = Self::init(conn)?;
        info!(?dir, "Store opened");
        Ok(store)
    }

    /// Open a throwaway in-memory store
    pub fn open_in_memory() -> Result<Self> {
        debug!("Store::open_in_memory: called");
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )?;
        Ok(Self {
            conn,
            publisher: Publisher::new(PUBSUB_CAPACITY),
        })
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        debug!(%key, "Store::get: called");
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    /// Insert or replace a value
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        debug!(%key, len = value.len(), "Store::set: called");
        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, crate::now_ms()],
        )?;
        Ok(())
    }

    /// Delete a key; returns whether it existed
    pub fn delete(&mut self, key: &str) -> Result<bool> {
        debug!(%key, "Store::delete: called");
        let n = self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(n > 0)
    }

    /// Keys matching a glob pattern, sorted
    pub fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        debug!(%pattern, "Store::keys: called");
        let mut stmt = self.conn.prepare("SELECT key FROM kv WHERE key GLOB ?1 ORDER BY key")?;
        let keys = stmt
            .query_map(params![pattern], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    /// Delete every key matching a glob pattern; returns the count removed
    pub fn invalidate(&mut self, pattern: &str) -> Result<usize> {
        debug!(%pattern, "Store::invalidate: called");
        let n = self.conn.execute("DELETE FROM kv WHERE key GLOB ?1", params![pattern])?;
        if n > 0 {
            debug!(%pattern, removed = n, "Store::invalidate: removed keys");
        }
        Ok(n)
    }

    /// Serialize and store a record under `<collection>:<id>`
    pub fn put<R: Record>(&mut self, record: &R) -> Result<()> {
        let key = record_key(R::collection_name(), record.id());
        let json = serde_json::to_string(record)?;
        self.set(&key, &json)
    }

    pub fn get_record<R: Record>(&self, id: &str) -> Result<Option<R>> {
        let key = record_key(R::collection_name(), id);
        match self.get(&key)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn delete_record<R: Record>(&mut self, id: &str) -> Result<bool> {
        self.delete(&record_key(R::collection_name(), id))
    }

    /// All values in a collection as raw JSON strings, ordered by key
    pub fn list_raw(&self, collection: &str) -> Result<Vec<String>> {
        debug!(%collection, "Store::list_raw: called");
        let pattern = format!("{}:*", collection);
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM kv WHERE key GLOB ?1 ORDER BY key")?;
        let values = stmt
            .query_map(params![pattern], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(values)
    }

    pub fn list<R: Record>(&self) -> Result<Vec<R>> {
        self.list_raw(R::collection_name())?
            .iter()
            .map(|json| serde_json::from_str(json).map_err(Into::into))
            .collect()
    }

    /// A cloneable handle for publishing outside the owning task
    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    pub fn publish(&self, channel: &str, payload: impl Into<String>) -> usize {
        self.publisher.publish(channel, payload)
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Publication> {
        self.publisher.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::tempdir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        text: String,
    }

    impl Record for Note {
        fn id(&self) -> &str {
            &self.id
        }

        fn collection_name() -> &'static str {
            "notes"
        }
    }

    fn note(id: &str, text: &str) -> Note {
        Note {
            id: id.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_set_get_delete() {
        let mut store = Store::open_in_memory().unwrap();
        assert_eq!(store.get("a").unwrap(), None);

        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));

        store.set("a", "2").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("2"));

        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn test_invalidate_pattern() {
        let mut store = Store::open_in_memory().unwrap();
        store.set("cache:tasks:all", "[]").unwrap();
        store.set("cache:tasks:p1", "[]").unwrap();
        store.set("cache:reports:last", "{}").unwrap();

        let removed = store.invalidate("cache:tasks:*").unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.keys("cache:*").unwrap(), vec!["cache:reports:last".to_string()]);
        assert_eq!(store.invalidate("cache:tasks:*").unwrap(), 0);
    }

    #[test]
    fn test_records_roundtrip_and_list() {
        let mut store = Store::open_in_memory().unwrap();
        store.put(&note("b", "second")).unwrap();
        store.put(&note("a", "first")).unwrap();
        store.set("notesx:zzz", "not a note").unwrap();

        let got: Option<Note> = store.get_record("a").unwrap();
        assert_eq!(got, Some(note("a", "first")));

        let all: Vec<Note> = store.list().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "a");

        assert!(store.delete_record::<Note>("a").unwrap());
        assert!(store.get_record::<Note>("a").unwrap().is_none());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        {
            let mut store = Store::open(dir.path()).unwrap();
            store.put(&note("n1", "kept")).unwrap();
        }
        let store = Store::open(dir.path()).unwrap();
        let got: Option<Note> = store.get_record("n1").unwrap();
        assert_eq!(got.map(|n| n.text), Some("kept".to_string()));
    }

    #[tokio::test]
    async fn test_publisher_outlives_borrow() {
        let store = Store::open_in_memory().unwrap();
        let publisher = store.publisher();
        let mut rx = store.subscribe();
        publisher.publish("tasks", "changed");
        assert_eq!(rx.recv().await.unwrap().payload, "changed");
    }
}
