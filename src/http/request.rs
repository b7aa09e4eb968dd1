//! Request head parsing.
//!
//! # Responsibilities
//! - Parse the request line and header block once it is fully buffered
//! - Extract the routing-relevant parts: method, path, `Content-Length`
//!
//! # Design Decisions
//! - Parsing is incremental: an incomplete head is `Ok(None)`, not an error
//! - Only `Content-Length` framing is supported; chunked bodies are rejected
//! - The query string is not part of the routing path

use http::Method;
use thiserror::Error;

/// Upper bound on headers accepted in one request.
pub const MAX_HEADERS: usize = 32;

/// Parsed request line and the headers the server cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: Method,
    /// Path without the query string.
    pub path: String,
    /// Declared body length, if a `Content-Length` header was sent.
    pub content_length: Option<usize>,
    /// Bytes taken by the request line, headers and the blank line.
    pub header_len: usize,
}

/// Reasons a buffered head cannot be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("malformed request")]
    Malformed,

    #[error("invalid content length")]
    InvalidContentLength,

    #[error("unsupported transfer encoding")]
    UnsupportedTransferEncoding,
}

/// Parse the head at the start of `buf`.
///
/// Returns `Ok(None)` while the blank line ending the header block has not
/// arrived yet.
pub fn parse_head(buf: &[u8]) -> Result<Option<RequestHead>, RequestError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);

    let header_len = match req.parse(buf) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(_) => return Err(RequestError::Malformed),
    };

    let method = req
        .method
        .and_then(|m| Method::from_bytes(m.as_bytes()).ok())
        .ok_or(RequestError::Malformed)?;
    let target = req.path.ok_or(RequestError::Malformed)?;
    let path = target.split_once('?').map_or(target, |(p, _)| p);

    let mut content_length = None;
    for header in req.headers.iter() {
        if header.name.eq_ignore_ascii_case("content-length") {
            let len = std::str::from_utf8(header.value)
                .ok()
                .and_then(|v| v.trim().parse::<usize>().ok())
                .ok_or(RequestError::InvalidContentLength)?;
            if content_length.is_some_and(|prev| prev != len) {
                return Err(RequestError::InvalidContentLength);
            }
            content_length = Some(len);
        } else if header.name.eq_ignore_ascii_case("transfer-encoding") {
            return Err(RequestError::UnsupportedTransferEncoding);
        }
    }

    Ok(Some(RequestHead {
        method,
        path: path.to_string(),
        content_length,
        header_len,
    }))
}
