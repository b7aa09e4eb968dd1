//! Fricu data server library.
//!
//! A small JSON document store over HTTP/1.1: a fixed pool of event-loop
//! threads shares one listening socket, and each thread owns its own SQLite
//! connection to a shared WAL database.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod storage;
pub mod worker;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::ServerConfig;
pub use lifecycle::{start, start_with_listener, ServerHandle, Shutdown, StartupError};
