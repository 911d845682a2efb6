//! SQLite-backed key-value persistence for stats counters and settings.
//! Survives restarts; every `put` is a single-row upsert, so writes are
//! atomic per key.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use autodial_core::{KvStore, StoreError};
use chrono::Utc;

/// SQLite key-value store.
pub struct SqliteKv {
    conn: rusqlite::Connection,
}

impl SqliteKv {
    /// Open or create the stats database.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Open(e.to_string()))?;
        }
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| StoreError::Open(format!("DB open: {e}")))?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self, StoreError> {
        let conn = rusqlite::Connection::open_in_memory()
            .map_err(|e| StoreError::Open(format!("DB open: {e}")))?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
         ",
            )
            .map_err(|e| StoreError::Open(format!("Migration: {e}")))?;
        Ok(())
    }
}

impl KvStore for SqliteKv {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM kv WHERE key = ?1")
            .map_err(|e| StoreError::Read(e.to_string()))?;
        let mut rows = stmt
            .query([key])
            .map_err(|e| StoreError::Read(e.to_string()))?;
        match rows.next().map_err(|e| StoreError::Read(e.to_string()))? {
            Some(row) => row
                .get::<_, String>(0)
                .map(Some)
                .map_err(|e| StoreError::Read(e.to_string())),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![key, value, Utc::now().to_rfc3339()],
            )
            .map_err(|e| StoreError::Write(format!("Save {key}: {e}")))?;
        Ok(())
    }
}

/// In-memory key-value store.
#[derive(Default)]
pub struct MemoryKv {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let map = self
            .map
            .lock()
            .map_err(|e| StoreError::Read(e.to_string()))?;
        Ok(map.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut map = self
            .map
            .lock()
            .map_err(|e| StoreError::Write(e.to_string()))?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_and_migrate() {
        let dir = std::env::temp_dir().join("autodial-kv-test");
        std::fs::create_dir_all(&dir).ok();
        let db = SqliteKv::open(&dir.join("test.db")).unwrap();
        assert_eq!(db.get("missing").unwrap(), None);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_put_overwrites() {
        let db = SqliteKv::open_in_memory().unwrap();
        db.put("counters", "1").unwrap();
        db.put("counters", "2").unwrap();
        assert_eq!(db.get("counters").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_survives_reopen() {
        let dir = std::env::temp_dir().join("autodial-kv-test-reopen");
        std::fs::create_dir_all(&dir).ok();
        let path = dir.join("stats.db");
        {
            let db = SqliteKv::open(&path).unwrap();
            db.put("dial_interval_ms", "2500").unwrap();
        }
        let db = SqliteKv::open(&path).unwrap();
        assert_eq!(db.get("dial_interval_ms").unwrap().as_deref(), Some("2500"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_memory_kv() {
        let kv = MemoryKv::new();
        assert_eq!(kv.get("a").unwrap(), None);
        kv.put("a", "x").unwrap();
        assert_eq!(kv.get("a").unwrap().as_deref(), Some("x"));
    }
}
