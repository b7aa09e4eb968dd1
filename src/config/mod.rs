//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → FRICU_* environment overrides (loader.rs)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → handed to startup, cloned into each worker
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - The key whitelist is configuration, not a compiled-in global

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::KeyConfig;
pub use schema::KeyShape;
pub use schema::LimitsConfig;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::ServerConfig;
pub use schema::StorageConfig;
pub use schema::TimeoutConfig;
pub use schema::WorkerConfig;
