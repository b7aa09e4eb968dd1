//! Per-worker storage handle.
//!
//! # Responsibilities
//! - Own one SQLite connection for the lifetime of a worker thread
//! - Serve point lookups, single-statement upserts and JSON validity checks
//!
//! # Design Decisions
//! - `rusqlite::Connection` is `Send` but not `Sync`; the handle is moved into
//!   its worker and never shared, so no mutex sits on the hot path
//! - Statements go through the connection's statement cache and are warmed at
//!   open time, so a broken schema fails the worker at startup
//! - Each call is an autocommit statement that is reset after use; no read
//!   snapshot outlives a request, so a GET sees every PUT committed before it,
//!   whichever worker committed it

use std::time::Duration;

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use crate::config::StorageConfig;
use crate::storage::error::StorageError;
use crate::storage::schema::apply_tuning;

const GET_SQL: &str = "SELECT data_value FROM kv_store WHERE data_key = ?1";

const UPSERT_SQL: &str = "INSERT INTO kv_store (data_key, data_value, updated_at) \
     VALUES (?1, ?2, CAST(strftime('%s', 'now') AS INTEGER)) \
     ON CONFLICT(data_key) DO UPDATE SET \
     data_value = excluded.data_value, updated_at = excluded.updated_at";

const JSON_VALID_SQL: &str = "SELECT json_valid(?1)";

/// A worker-owned connection to the shared database file.
pub struct WorkerStore {
    conn: Connection,
}

impl WorkerStore {
    /// Open a handle on an already bootstrapped database.
    pub fn open(config: &StorageConfig) -> Result<Self, StorageError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn =
            Connection::open_with_flags(&config.path, flags).map_err(|source| StorageError::Open {
                path: config.path.clone(),
                source,
            })?;

        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .map_err(|source| StorageError::Pragma {
                pragma: "busy_timeout",
                source,
            })?;
        apply_tuning(&conn, config)?;
        let cache_kib = i64::try_from(config.cache_size_kib).unwrap_or(i64::MAX);
        conn.pragma_update(None, "cache_size", -cache_kib)
            .map_err(|source| StorageError::Pragma {
                pragma: "cache_size",
                source,
            })?;

        for sql in [GET_SQL, UPSERT_SQL, JSON_VALID_SQL] {
            conn.prepare_cached(sql).map_err(StorageError::Prepare)?;
        }

        Ok(Self { conn })
    }

    /// Stored document for `key`, if a row exists.
    pub fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut stmt = self.conn.prepare_cached(GET_SQL)?;
        let value = stmt
            .query_row(params![key], |row| row.get::<_, String>(0))
            .optional()?;
        Ok(value)
    }

    /// Replace the document stored under `key`, inserting the row if needed.
    pub fn upsert(&self, key: &str, json: &str) -> Result<(), StorageError> {
        let mut stmt = self.conn.prepare_cached(UPSERT_SQL)?;
        stmt.execute(params![key, json])?;
        Ok(())
    }

    /// Ask SQLite whether `text` is well-formed JSON.
    pub fn is_valid_json(&self, text: &str) -> Result<bool, StorageError> {
        let mut stmt = self.conn.prepare_cached(JSON_VALID_SQL)?;
        let valid = stmt.query_row(params![text], |row| row.get::<_, bool>(0))?;
        Ok(valid)
    }
}
