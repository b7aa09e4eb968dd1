//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms via `metrics`)
//!
//! Consumers:
//!     → stderr (text or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Connection and request logs are `debug`/`trace`; the hot path stays quiet
//!   at the default level
//! - Metric updates are atomic increments and never block a worker

pub mod logging;
pub mod metrics;
