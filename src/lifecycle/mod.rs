//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     fd limit → bind → schema bootstrap → spawn workers → all ready
//!
//! Shutdown (shutdown.rs):
//!     trigger → wake every readiness queue → workers close connections → join
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → main triggers shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, nothing is left half-running
//! - Listener binds before the pool exists, so a bad address never spawns
//!   threads

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{start, start_with_listener, ServerHandle, StartupError};
