//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! buffered bytes (net::framing)
//!     → request.rs (parse head: method, path, Content-Length)
//!     → handler.rs prepare (route, whitelist check, body wait)
//!     → handler.rs execute (GET / PUT against the worker's store)
//!     → response.rs (encode, Connection: close)
//!     → written by the worker, socket closed
//! ```
//!
//! # Supported Surface
//! - `GET /health`
//! - `GET /v1/data/{key}`
//! - `PUT /v1/data/{key}` with a `Content-Length` JSON body
//! - One request per connection, no chunked encoding, no keep-alive

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{Handler, Prepared, Route};
pub use request::{parse_head, RequestError, RequestHead};
pub use response::Response;
