//! Request routing and dispatch against the storage handle.
//!
//! Two steps:
//! 1. `prepare` looks only at the head and decides whether the request can
//!    be answered now, must wait for a body, or is rejected.
//! 2. `execute` runs a fully received request against the worker's store.
//!
//! Unknown keys are rejected in step 1, before any body is read and before
//! storage is touched.

use http::Method;

use crate::http::request::RequestHead;
use crate::http::response::Response;
use crate::storage::{KeySet, WorkerStore};

const DATA_PREFIX: &str = "/v1/data/";

/// What a fully received request asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Health,
    Get(String),
    Put(String),
}

/// Result of inspecting a request head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prepared {
    /// No body needed; dispatch immediately.
    Ready(Route),
    /// Dispatch once `len` body bytes are buffered.
    AwaitBody { route: Route, len: usize },
    /// Answer without touching storage.
    Reject(Response),
}

/// Protocol handler shared (by clone) across workers.
#[derive(Debug, Clone)]
pub struct Handler {
    keys: KeySet,
    max_request_bytes: usize,
}

impl Handler {
    pub fn new(keys: KeySet, max_request_bytes: usize) -> Self {
        Self {
            keys,
            max_request_bytes,
        }
    }

    /// Route a parsed head.
    pub fn prepare(&self, head: &RequestHead) -> Prepared {
        if head.path == "/health" {
            return if head.method == Method::GET {
                Prepared::Ready(Route::Health)
            } else {
                Prepared::Reject(Response::method_not_allowed())
            };
        }

        let Some(key) = head.path.strip_prefix(DATA_PREFIX) else {
            return Prepared::Reject(Response::not_found());
        };
        if !self.keys.contains(key) {
            return Prepared::Reject(Response::unknown_key());
        }

        match head.method {
            Method::GET => Prepared::Ready(Route::Get(key.to_string())),
            Method::PUT => {
                let len = head.content_length.unwrap_or(0);
                if head.header_len.saturating_add(len) > self.max_request_bytes {
                    return Prepared::Reject(Response::payload_too_large());
                }
                let route = Route::Put(key.to_string());
                if len == 0 {
                    Prepared::Ready(route)
                } else {
                    Prepared::AwaitBody { route, len }
                }
            }
            _ => Prepared::Reject(Response::method_not_allowed()),
        }
    }

    /// Serve a complete request. `body` is exactly the declared body bytes.
    pub fn execute(&self, route: &Route, body: &[u8], store: &WorkerStore) -> Response {
        match route {
            Route::Health => Response::health(),
            Route::Get(key) => self.get(key, store),
            Route::Put(key) => self.put(key, body, store),
        }
    }

    fn get(&self, key: &str, store: &WorkerStore) -> Response {
        match store.get(key) {
            Ok(Some(document)) => Response::json(http::StatusCode::OK, document),
            Ok(None) => {
                let default = self.keys.default_document(key).unwrap_or("[]");
                Response::json(http::StatusCode::OK, default)
            }
            Err(e) => {
                tracing::error!(key, error = %e, "Lookup failed");
                Response::database_error()
            }
        }
    }

    fn put(&self, key: &str, body: &[u8], store: &WorkerStore) -> Response {
        let Ok(text) = std::str::from_utf8(body) else {
            return Response::invalid_json();
        };

        match store.is_valid_json(text) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(key, bytes = body.len(), "Rejected invalid JSON");
                return Response::invalid_json();
            }
            Err(e) => {
                tracing::error!(key, error = %e, "JSON validation failed");
                return Response::database_error();
            }
        }

        match store.upsert(key, text) {
            Ok(()) => {
                tracing::debug!(key, bytes = body.len(), "Document replaced");
                Response::no_content()
            }
            Err(e) => {
                tracing::error!(key, error = %e, "Upsert failed");
                Response::database_error()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::storage::bootstrap;
    use http::StatusCode;

    fn head(method: Method, path: &str, content_length: Option<usize>) -> RequestHead {
        RequestHead {
            method,
            path: path.to_string(),
            content_length,
            header_len: 64,
        }
    }

    fn handler() -> Handler {
        Handler::new(KeySet::default(), 65_536)
    }

    fn store(dir: &tempfile::TempDir) -> WorkerStore {
        let config = StorageConfig {
            path: dir.path().join("handler.db").display().to_string(),
            ..StorageConfig::default()
        };
        bootstrap(&config, &KeySet::default()).unwrap();
        WorkerStore::open(&config).unwrap()
    }

    fn rejected_status(prepared: Prepared) -> StatusCode {
        match prepared {
            Prepared::Reject(resp) => resp.status(),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn health_routes_without_storage() {
        assert_eq!(
            handler().prepare(&head(Method::GET, "/health", None)),
            Prepared::Ready(Route::Health)
        );
        assert_eq!(
            rejected_status(handler().prepare(&head(Method::POST, "/health", None))),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[test]
    fn unknown_key_is_404_for_any_method() {
        for method in [Method::GET, Method::PUT, Method::DELETE] {
            let prepared = handler().prepare(&head(method, "/v1/data/secrets", Some(10)));
            match prepared {
                Prepared::Reject(resp) => {
                    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
                    assert!(resp.body().contains("unknown key"));
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn other_paths_are_404() {
        assert_eq!(
            rejected_status(handler().prepare(&head(Method::GET, "/v2/data/profile", None))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            rejected_status(handler().prepare(&head(Method::GET, "/", None))),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn known_key_with_other_method_is_405() {
        assert_eq!(
            rejected_status(handler().prepare(&head(Method::DELETE, "/v1/data/profile", None))),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[test]
    fn put_waits_for_declared_body() {
        assert_eq!(
            handler().prepare(&head(Method::PUT, "/v1/data/events", Some(12))),
            Prepared::AwaitBody {
                route: Route::Put("events".into()),
                len: 12
            }
        );
    }

    #[test]
    fn put_larger_than_cap_is_413() {
        let handler = Handler::new(KeySet::default(), 1024);
        assert_eq!(
            rejected_status(handler.prepare(&head(Method::PUT, "/v1/data/events", Some(1000)))),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn get_returns_default_then_stored_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let handler = handler();

        let resp = handler.execute(&Route::Get("profile".into()), &[], &store);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.body(), "{}");

        let body = br#"{"name":"rider","ftp":250}"#;
        let resp = handler.execute(&Route::Put("profile".into()), body, &store);
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(resp.body(), "");

        let resp = handler.execute(&Route::Get("profile".into()), &[], &store);
        assert_eq!(resp.body().as_bytes(), body);
    }

    #[test]
    fn invalid_json_leaves_document_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let handler = handler();

        handler.execute(&Route::Put("workouts".into()), b"[1,2]", &store);
        let bad_bodies: [&[u8]; 4] = [b"[1,2", b"{oops}", b"", b"\xff\xfe"];
        for bad in bad_bodies {
            let resp = handler.execute(&Route::Put("workouts".into()), bad, &store);
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            assert!(resp.body().contains("invalid json payload"));
        }
        assert_eq!(store.get("workouts").unwrap().as_deref(), Some("[1,2]"));
    }

    #[test]
    fn storage_failures_are_500() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let handler = handler();

        rusqlite::Connection::open(dir.path().join("handler.db"))
            .unwrap()
            .execute_batch("DROP TABLE kv_store")
            .unwrap();

        let resp = handler.execute(&Route::Get("profile".into()), &[], &store);
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.body(), r#"{"error":"database error"}"#);

        let resp = handler.execute(&Route::Put("profile".into()), b"{}", &store);
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.body(), r#"{"error":"database error"}"#);

        // Invalid bodies are still rejected before storage is written.
        let resp = handler.execute(&Route::Put("profile".into()), b"{oops", &store);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_row_falls_back_to_shape_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            path: dir.path().join("bare.db").display().to_string(),
            ..StorageConfig::default()
        };
        bootstrap(&config, &KeySet::new(&[])).unwrap();
        let store = WorkerStore::open(&config).unwrap();

        let resp = handler().execute(&Route::Get("custom_foods".into()), &[], &store);
        assert_eq!(resp.body(), "[]");
        let resp = handler().execute(&Route::Get("profile".into()), &[], &store);
        assert_eq!(resp.body(), "{}");
    }
}
