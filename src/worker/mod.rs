//! Worker subsystem: the core concurrency engine.
//!
//! # Data Flow
//! ```text
//! pool.rs spawns N threads, each:
//!     → event_loop.rs opens its own WorkerStore and ReadinessQueue
//!     → registers its duplicate of the listener, reports ready
//!     → poller.rs wait()
//!         LISTENER → accept until WouldBlock, register clients
//!         client   → read, frame, dispatch, respond, close
//!         WAKER    → re-check the shutdown flag
//!     → periodic idle sweep
//! ```
//!
//! # Design Decisions
//! - OS threads, not async tasks: every request is a short synchronous
//!   SQLite call, so a blocking thread per event loop keeps the path simple
//! - Nothing per-connection crosses threads; the worker that accepts a
//!   socket owns it until it closes

pub mod event_loop;
pub mod poller;
pub mod pool;

pub use event_loop::{EventLoop, WorkerContext};
pub use pool::{WorkerError, WorkerPool};
