//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Hard bounds on the worker pool size.
pub const MIN_WORKERS: usize = 1;
pub const MAX_WORKERS: usize = 1024;

/// Root configuration for the key-value server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listening socket settings.
    pub listener: ListenerConfig,

    /// Worker pool sizing.
    pub workers: WorkerConfig,

    /// Database file and per-handle tuning.
    pub storage: StorageConfig,

    /// Request buffering limits.
    pub limits: LimitsConfig,

    /// Connection timeouts.
    pub timeouts: TimeoutConfig,

    /// Keys the store accepts, with the shape of their default document.
    pub keys: Vec<KeyConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            workers: WorkerConfig::default(),
            storage: StorageConfig::default(),
            limits: LimitsConfig::default(),
            timeouts: TimeoutConfig::default(),
            keys: default_keys(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address as `host:port` (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Accept backlog passed to `listen(2)`.
    pub backlog: u32,

    /// Send/receive buffer size hint for the listening socket.
    pub socket_buffer_bytes: usize,

    /// Soft open-file limit the process tries to raise itself to.
    pub fd_limit_target: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            backlog: 65_535,
            socket_buffer_bytes: 65_535,
            fd_limit_target: 200_000,
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Requested number of event-loop threads.
    pub count: usize,

    /// Maximum readiness events drained per wait.
    pub max_events: usize,
}

impl WorkerConfig {
    /// Worker count clamped to `[MIN_WORKERS, MAX_WORKERS]`.
    pub fn effective_count(&self) -> usize {
        self.count.clamp(MIN_WORKERS, MAX_WORKERS)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: 64,
            max_events: 1024,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    pub path: String,

    /// How long a handle waits on a locked database before failing.
    pub busy_timeout_ms: u64,

    /// `mmap_size` pragma in bytes.
    pub mmap_size_bytes: u64,

    /// Page cache per handle in KiB (applied as a negative `cache_size`).
    pub cache_size_kib: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "fricu_server.db".to_string(),
            busy_timeout_ms: 5_000,
            mmap_size_bytes: 256 * 1024 * 1024,
            cache_size_kib: 32 * 1024,
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Receive buffer allocated for a fresh connection.
    pub initial_buffer_bytes: usize,

    /// Hard cap on a whole request (headers + body).
    pub max_request_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            initial_buffer_bytes: 8 * 1024,
            max_request_bytes: 64 * 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Close connections that stay silent this long. 0 disables the sweep.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { idle_secs: 30 }
    }
}

/// Shape of a key's default document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyShape {
    /// A single JSON object, `{}` when unset.
    Object,
    /// A JSON array of records, `[]` when unset.
    Collection,
}

impl KeyShape {
    /// The empty document for this shape.
    pub fn default_document(self) -> &'static str {
        match self {
            KeyShape::Object => "{}",
            KeyShape::Collection => "[]",
        }
    }
}

/// One accepted key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct KeyConfig {
    /// Key name as it appears in `/v1/data/{name}`.
    pub name: String,

    /// Shape of the stored document.
    #[serde(default = "default_shape")]
    pub shape: KeyShape,
}

impl KeyConfig {
    pub fn new(name: impl Into<String>, shape: KeyShape) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }
}

fn default_shape() -> KeyShape {
    KeyShape::Collection
}

/// The keys the desktop client persists.
pub fn default_keys() -> Vec<KeyConfig> {
    vec![
        KeyConfig::new("activities", KeyShape::Collection),
        KeyConfig::new("activity_metric_insights", KeyShape::Collection),
        KeyConfig::new("meal_plans", KeyShape::Collection),
        KeyConfig::new("custom_foods", KeyShape::Collection),
        KeyConfig::new("workouts", KeyShape::Collection),
        KeyConfig::new("events", KeyShape::Collection),
        KeyConfig::new("profile", KeyShape::Object),
        KeyConfig::new("lactate_history_records", KeyShape::Collection),
    ]
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Text,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
