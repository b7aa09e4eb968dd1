//! Persistence layer.
//!
//! # Data Flow
//! ```text
//! startup
//!     → schema.rs (bootstrap once: WAL, table, default row per key)
//! each worker thread
//!     → handle.rs (WorkerStore: own connection, cached statements)
//!     → get / upsert / is_valid_json from the protocol handler
//! ```
//!
//! # Design Decisions
//! - One JSON document per key; the table is a flat map, not rows of records
//! - Concurrency is delegated to SQLite's WAL locking, never to app locks
//! - Upsert is one statement, so there is no read-then-write race
//! - JSON validity is SQLite's `json_valid`, not a hand-rolled parser

pub mod error;
pub mod handle;
pub mod keys;
pub mod schema;

pub use error::StorageError;
pub use handle::WorkerStore;
pub use keys::KeySet;
pub use schema::bootstrap;
