//! One-time schema bootstrap.
//!
//! Runs on a dedicated connection before any worker opens its own handle:
//! switches the file to WAL, creates the table and seeds one default row per
//! accepted key. Every statement is idempotent, so bootstrapping an existing
//! database never alters stored documents.

use rusqlite::{params, Connection, OpenFlags};

use crate::config::StorageConfig;
use crate::storage::error::StorageError;
use crate::storage::keys::KeySet;

pub(crate) const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS kv_store (
    data_key TEXT PRIMARY KEY,
    data_value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);";

const SEED_SQL: &str = "INSERT OR IGNORE INTO kv_store (data_key, data_value, updated_at) \
     VALUES (?1, ?2, CAST(strftime('%s', 'now') AS INTEGER))";

/// Apply the pragmas shared by the bootstrap connection and worker handles.
pub(crate) fn apply_tuning(conn: &Connection, config: &StorageConfig) -> Result<(), StorageError> {
    conn.pragma_update(None, "synchronous", "NORMAL")
        .map_err(|source| StorageError::Pragma {
            pragma: "synchronous",
            source,
        })?;
    conn.pragma_update(None, "temp_store", "MEMORY")
        .map_err(|source| StorageError::Pragma {
            pragma: "temp_store",
            source,
        })?;
    let mmap = i64::try_from(config.mmap_size_bytes).unwrap_or(i64::MAX);
    // mmap_size echoes the applied value as a row.
    conn.pragma(None, "mmap_size", mmap, |_| Ok(()))
        .map_err(|source| StorageError::Pragma {
            pragma: "mmap_size",
            source,
        })?;
    Ok(())
}

/// Create the table (if absent), enable WAL and seed defaults for `keys`.
pub fn bootstrap(config: &StorageConfig, keys: &KeySet) -> Result<(), StorageError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let mut conn =
        Connection::open_with_flags(&config.path, flags).map_err(|source| StorageError::Open {
            path: config.path.clone(),
            source,
        })?;

    let mode: String = conn
        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
        .map_err(|source| StorageError::Pragma {
            pragma: "journal_mode",
            source,
        })?;
    if !mode.eq_ignore_ascii_case("wal") {
        return Err(StorageError::JournalMode(mode));
    }
    apply_tuning(&conn, config)?;

    conn.execute_batch(CREATE_TABLE_SQL)
        .map_err(StorageError::Schema)?;

    let tx = conn.transaction().map_err(StorageError::Schema)?;
    let mut seeded = 0usize;
    {
        let mut stmt = tx.prepare(SEED_SQL).map_err(StorageError::Schema)?;
        for key in keys.iter() {
            let default = keys.default_document(key).unwrap_or("[]");
            seeded += stmt
                .execute(params![key, default])
                .map_err(StorageError::Schema)?;
        }
    }
    tx.commit().map_err(StorageError::Schema)?;

    tracing::info!(
        path = %config.path,
        keys = keys.len(),
        seeded,
        "Schema ready"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KeyConfig, KeyShape};

    fn temp_config(dir: &tempfile::TempDir) -> StorageConfig {
        StorageConfig {
            path: dir.path().join("store.db").display().to_string(),
            ..StorageConfig::default()
        }
    }

    fn rows(config: &StorageConfig) -> Vec<(String, String)> {
        let conn = Connection::open(&config.path).unwrap();
        let mut stmt = conn
            .prepare("SELECT data_key, data_value FROM kv_store ORDER BY data_key")
            .unwrap();
        stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn seeds_one_row_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let config = temp_config(&dir);
        bootstrap(&config, &KeySet::default()).unwrap();

        let rows = rows(&config);
        assert_eq!(rows.len(), 8);
        assert!(rows.contains(&("profile".into(), "{}".into())));
        assert!(rows.contains(&("activities".into(), "[]".into())));
    }

    #[test]
    fn enables_wal() {
        let dir = tempfile::tempdir().unwrap();
        let config = temp_config(&dir);
        bootstrap(&config, &KeySet::default()).unwrap();

        let conn = Connection::open(&config.path).unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_ascii_lowercase(), "wal");
    }

    #[test]
    fn rerun_keeps_existing_documents() {
        let dir = tempfile::tempdir().unwrap();
        let config = temp_config(&dir);
        let keys = KeySet::default();
        bootstrap(&config, &keys).unwrap();

        Connection::open(&config.path)
            .unwrap()
            .execute(
                "UPDATE kv_store SET data_value = '[1]' WHERE data_key = 'events'",
                [],
            )
            .unwrap();

        bootstrap(&config, &keys).unwrap();
        assert!(rows(&config).contains(&("events".into(), "[1]".into())));
    }

    #[test]
    fn new_keys_are_seeded_on_later_runs() {
        let dir = tempfile::tempdir().unwrap();
        let config = temp_config(&dir);
        bootstrap(&config, &KeySet::new(&[KeyConfig::new("a", KeyShape::Object)])).unwrap();
        bootstrap(
            &config,
            &KeySet::new(&[
                KeyConfig::new("a", KeyShape::Object),
                KeyConfig::new("b", KeyShape::Collection),
            ]),
        )
        .unwrap();
        assert_eq!(
            rows(&config),
            vec![("a".into(), "{}".into()), ("b".into(), "[]".into())]
        );
    }

    #[test]
    fn unopenable_path_fails() {
        let config = StorageConfig {
            path: "/nonexistent-dir/for/sure/store.db".into(),
            ..StorageConfig::default()
        };
        let err = bootstrap(&config, &KeySet::default()).unwrap_err();
        assert!(matches!(
            err,
            StorageError::Open { .. } | StorageError::Pragma { .. }
        ));
    }
}
