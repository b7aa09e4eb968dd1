//! Storage error type.

use thiserror::Error;

/// Errors raised by schema bootstrap or a worker's storage handle.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database file could not be opened.
    #[error("failed to open database {path}: {source}")]
    Open {
        path: String,
        source: rusqlite::Error,
    },

    /// A pragma could not be applied.
    #[error("failed to apply pragma {pragma}: {source}")]
    Pragma {
        pragma: &'static str,
        source: rusqlite::Error,
    },

    /// The database refused to switch to WAL journaling.
    #[error("journal mode is {0:?}, expected \"wal\"")]
    JournalMode(String),

    /// Table creation or default seeding failed.
    #[error("failed to initialise schema: {0}")]
    Schema(#[source] rusqlite::Error),

    /// A statement could not be prepared.
    #[error("failed to prepare statement: {0}")]
    Prepare(#[source] rusqlite::Error),

    /// A lookup, upsert or validity check failed at execution time.
    #[error("database error: {0}")]
    Query(#[from] rusqlite::Error),
}
