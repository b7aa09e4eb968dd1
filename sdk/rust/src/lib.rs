//! Async client for the Fricu data server.

pub mod client;

pub use client::{ClientError, DataClient, Health};
