//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! listener.rs (bind once, SO_REUSEADDR / SO_REUSEPORT, backlog)
//!     → duplicated into every worker's readiness queue
//!     → worker accepts until WouldBlock
//!     → connection.rs (socket + framer, tracked for metrics)
//!     → framing.rs (buffer growth, head/body state machine)
//!     → hand off to the HTTP layer, write response, close
//! ```
//!
//! # Design Decisions
//! - One request per connection; the socket closes after the response
//! - Buffers grow by doubling and are capped, so a slow or hostile client
//!   costs at most one capped buffer

pub mod connection;
pub mod framing;
pub mod listener;

pub use connection::{Connection, ConnectionId, ConnectionTracker, ReadOutcome};
pub use framing::RequestFramer;
pub use listener::{Listener, ListenerError};
