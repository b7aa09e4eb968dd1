//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Response ready:
//!     → retries.rs (write_all_with_retry on the non-blocking socket)
//!     → On WouldBlock: backoff.rs (short jittered sleep), bounded attempts
//! ```
//!
//! # Design Decisions
//! - Only the write path retries; everything else fails fast
//! - The caller re-issues failed requests, the server never replays them

pub mod backoff;
pub mod retries;

pub use retries::{write_all_with_retry, WriteRetryPolicy};
