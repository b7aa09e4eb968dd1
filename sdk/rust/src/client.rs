use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

/// Error type for data API calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx reply; `message` is the server's `error` field.
    #[error("server returned {status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("invalid JSON from server: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Health check reply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Health {
    pub status: String,
}

/// Client for the `/v1/data` API.
#[derive(Debug, Clone)]
pub struct DataClient {
    client: Client,
    base_url: String,
}

impl DataClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Reuse an existing `reqwest` client (connection pool, timeouts).
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn data_url(&self, key: &str) -> String {
        format!("{}/v1/data/{}", self.base_url, key)
    }

    pub async fn health(&self) -> Result<Health, ClientError> {
        let resp = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        let text = check(resp).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Fetch a document as parsed JSON.
    pub async fn get(&self, key: &str) -> Result<Value, ClientError> {
        let text = self.get_raw(key).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Fetch a document exactly as stored.
    pub async fn get_raw(&self, key: &str) -> Result<String, ClientError> {
        let resp = self.client.get(self.data_url(key)).send().await?;
        check(resp).await
    }

    /// Replace a document.
    pub async fn put(&self, key: &str, document: &Value) -> Result<(), ClientError> {
        self.put_raw(key, serde_json::to_string(document)?).await
    }

    /// Replace a document with pre-serialized bytes; the server validates them.
    pub async fn put_raw(&self, key: &str, body: String) -> Result<(), ClientError> {
        let resp = self
            .client
            .put(self.data_url(key))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        check(resp).await.map(|_| ())
    }
}

/// Return the body of a 2xx reply, or decode the error body.
async fn check(resp: Response) -> Result<String, ClientError> {
    let status = resp.status();
    let text = resp.text().await?;
    if status.is_success() {
        return Ok(text);
    }

    let message = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => body.error,
        Err(_) => text,
    };
    Err(ClientError::Api { status, message })
}
