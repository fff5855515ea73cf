//! SQLite-backed deferred identity slot
//!
//! The identity is stored as JSON in a small key/value table so it survives
//! restarts of the host application.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::types::DeferredIdentity;

use super::{DeferredIdentityStore, DEFERRED_IDENTITY_KEY};

/// Durable deferred identity store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this store
    pub fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        super::schema::run_migrations(&conn)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Storage("store connection poisoned".to_string()))
    }

    // ============================================
    // Raw key/value operations
    // ============================================

    /// Read the raw JSON stored under `key`
    pub fn get_raw(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row("SELECT value FROM kv_store WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;

        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    /// Write `value` under `key`, replacing any previous value
    pub fn set_raw(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Delete `key`; returns whether a row existed
    pub fn delete_raw(&self, key: &str) -> Result<bool> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM kv_store WHERE key = ?", [key])?;
        Ok(removed > 0)
    }

    /// When `key` was last written
    pub fn updated_at(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT updated_at FROM kv_store WHERE key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()?;

        Ok(raw
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)))
    }
}

impl DeferredIdentityStore for SqliteStore {
    fn get(&self) -> Result<Option<DeferredIdentity>> {
        let value = match self.get_raw(DEFERRED_IDENTITY_KEY) {
            Ok(Some(value)) => value,
            Ok(None) => return Ok(None),
            Err(Error::Json(e)) => {
                tracing::warn!(
                    key = DEFERRED_IDENTITY_KEY,
                    error = %e,
                    "Ignoring deferred identity that is not JSON"
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        match serde_json::from_value(value) {
            Ok(identity) => Ok(Some(identity)),
            Err(e) => {
                tracing::warn!(
                    key = DEFERRED_IDENTITY_KEY,
                    error = %e,
                    "Ignoring unreadable deferred identity"
                );
                Ok(None)
            }
        }
    }

    fn set(&self, identity: &DeferredIdentity) -> Result<()> {
        let value = serde_json::to_value(identity)?;
        self.set_raw(DEFERRED_IDENTITY_KEY, &value)
    }

    fn remove(&self) -> Result<()> {
        self.delete_raw(DEFERRED_IDENTITY_KEY)?;
        Ok(())
    }

    fn last_written(&self) -> Result<Option<DateTime<Utc>>> {
        self.updated_at(DEFERRED_IDENTITY_KEY)
    }
}
