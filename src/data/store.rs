//! Shared durable key-value store
//!
//! Every context (orchestrator, relay, page agents) reads and writes cross-context
//! state only through this store. Values are JSON documents under top-level keys.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::database::{Database, StoreError};

/// A set of key/value pairs as returned by `get` and accepted by `set`
pub type Record = Map<String, Value>;

/// Key-value view over the `store_entries` table
#[derive(Clone, Debug)]
pub struct SharedStore {
    db: Database,
}

impl SharedStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Fetch the given keys; missing keys are absent from the record
    pub fn get(&self, keys: &[&str]) -> Result<Record, StoreError> {
        let conn = self.db.lock()?;
        let mut record = Record::new();
        for key in keys {
            if let Some(value) = read_value(&conn, key)? {
                record.insert((*key).to_string(), value);
            }
        }
        Ok(record)
    }

    /// Insert or overwrite every key in `record`
    pub fn set(&self, record: Record) -> Result<(), StoreError> {
        let conn = self.db.lock()?;
        for (key, value) in &record {
            write_value(&conn, key, value)?;
        }
        Ok(())
    }

    /// Delete the given keys; deleting a missing key is a no-op
    pub fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let conn = self.db.lock()?;
        for key in keys {
            conn.execute("DELETE FROM store_entries WHERE key = ?1", params![key])?;
        }
        Ok(())
    }

    /// Typed read of a single key
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let conn = self.db.lock()?;
        read_value(&conn, key)?
            .map(|value| decode(key, value))
            .transpose()
    }

    /// Typed write of a single key
    pub fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let value = encode(key, value)?;
        let conn = self.db.lock()?;
        write_value(&conn, key, &value)
    }

    /// Read-modify-write of a single key under one connection lock.
    ///
    /// `f` receives the current value (if any); returning `None` deletes the key.
    /// Returns the value that was written.
    pub fn update<T, F>(&self, key: &str, f: F) -> Result<Option<T>, StoreError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Option<T>) -> Option<T>,
    {
        let conn = self.db.lock()?;
        let current = read_value(&conn, key)?
            .map(|value| decode(key, value))
            .transpose()?;

        let next = f(current);
        match &next {
            Some(value) => write_value(&conn, key, &encode(key, value)?)?,
            None => {
                conn.execute("DELETE FROM store_entries WHERE key = ?1", params![key])?;
            }
        }
        Ok(next)
    }

    /// All stored keys, for diagnostics
    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT key FROM store_entries ORDER BY key")?;
            let keys = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(keys)
        })
    }
}

fn read_value(conn: &Connection, key: &str) -> Result<Option<Value>, StoreError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM store_entries WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;

    raw.map(|text| {
        serde_json::from_str(&text).map_err(|source| StoreError::Serde {
            key: key.to_string(),
            source,
        })
    })
    .transpose()
}

fn write_value(conn: &Connection, key: &str, value: &Value) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO store_entries (key, value, updated_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
        params![key, value.to_string(), Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

fn decode<T: DeserializeOwned>(key: &str, value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|source| StoreError::Serde {
        key: key.to_string(),
        source,
    })
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|source| StoreError::Serde {
        key: key.to_string(),
        source,
    })
}
