//! Response construction and encoding.
//!
//! # Responsibilities
//! - Build the fixed set of responses the server emits
//! - Encode them as HTTP/1.1 with exact `Content-Length` and `Connection: close`
//!
//! # Design Decisions
//! - Every body is JSON; errors are `{"error": "..."}` so callers can branch
//!   on the failure class without reading the status line
//! - Stored documents are echoed verbatim, never re-serialized

use http::StatusCode;
use serde_json::json;

const HEALTH_BODY: &str = r#"{"status":"ok"}"#;

/// A complete response waiting to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    body: String,
}

impl Response {
    /// Response with a raw JSON body.
    pub fn json(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// `{"error": message}` with the given status.
    pub fn error(status: StatusCode, message: &str) -> Self {
        Self::json(status, json!({ "error": message }).to_string())
    }

    /// `200 {"status":"ok"}`.
    pub fn health() -> Self {
        Self::json(StatusCode::OK, HEALTH_BODY)
    }

    /// `204` with an empty body.
    pub fn no_content() -> Self {
        Self::json(StatusCode::NO_CONTENT, String::new())
    }

    pub fn not_found() -> Self {
        Self::error(StatusCode::NOT_FOUND, "not found")
    }

    pub fn unknown_key() -> Self {
        Self::error(StatusCode::NOT_FOUND, "unknown key")
    }

    pub fn method_not_allowed() -> Self {
        Self::error(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
    }

    pub fn bad_request(message: &str) -> Self {
        Self::error(StatusCode::BAD_REQUEST, message)
    }

    pub fn invalid_json() -> Self {
        Self::bad_request("invalid json payload")
    }

    pub fn payload_too_large() -> Self {
        Self::error(StatusCode::PAYLOAD_TOO_LARGE, "request too large")
    }

    pub fn database_error() -> Self {
        Self::error(StatusCode::INTERNAL_SERVER_ERROR, "database error")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Serialize status line, headers and body.
    pub fn encode(&self) -> Vec<u8> {
        let head = format!(
            "HTTP/1.1 {} {}\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\r\n",
            self.status.as_u16(),
            self.status.canonical_reason().unwrap_or("Unknown"),
            self.body.len()
        );
        let mut out = Vec::with_capacity(head.len() + self.body.len());
        out.extend_from_slice(head.as_bytes());
        out.extend_from_slice(self.body.as_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_health() {
        let bytes = Response::health().encode();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            "HTTP/1.1 200 OK\r\n\
             Content-Type: application/json\r\n\
             Content-Length: 15\r\n\
             Connection: close\r\n\r\n\
             {\"status\":\"ok\"}"
        );
    }

    #[test]
    fn no_content_has_zero_length() {
        let text = String::from_utf8(Response::no_content().encode()).unwrap();
        assert!(text.starts_with("HTTP/1.1 204 No Content\r\n"));
        assert!(text.contains("Content-Length: 0\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn errors_carry_machine_readable_field() {
        let resp = Response::payload_too_large();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body: serde_json::Value = serde_json::from_str(resp.body()).unwrap();
        assert_eq!(body["error"], "request too large");
    }

    #[test]
    fn content_length_counts_bytes_not_chars() {
        let resp = Response::json(StatusCode::OK, r#"["é"]"#);
        let text = String::from_utf8(resp.encode()).unwrap();
        assert!(text.contains("Content-Length: 6\r\n"));
    }
}
