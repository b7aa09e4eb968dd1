//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use fricu_server::config::{ListenerConfig, ServerConfig};
use fricu_server::net::Listener;
use fricu_server::{start_with_listener, ServerHandle};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Configuration for a test server storing into `db_path`.
pub fn test_config(db_path: &Path) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.workers.count = 4;
    config.storage.path = db_path.to_string_lossy().into_owned();
    config
}

/// A running server on an ephemeral loopback port. Stops on drop.
pub struct TestServer {
    handle: Option<ServerHandle>,
    addr: SocketAddr,
}

impl TestServer {
    pub fn start(config: &ServerConfig) -> Self {
        let listener = Listener::bind("127.0.0.1:0".parse().unwrap(), &ListenerConfig::default())
            .expect("bind loopback");
        let handle = start_with_listener(listener, config).expect("server starts");
        let addr = handle.local_addr();
        Self {
            handle: Some(handle),
            addr,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn active_connections(&self) -> u64 {
        self.handle.as_ref().map_or(0, ServerHandle::active_connections)
    }

    /// Stop and join, surfacing worker errors.
    pub fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.shutdown();
            handle.join().expect("workers exit cleanly");
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.shutdown();
            let _ = handle.join();
        }
    }
}

/// A parsed HTTP response.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn parse_response(bytes: &[u8]) -> RawResponse {
    let mut headers = [httparse::EMPTY_HEADER; 16];
    let mut response = httparse::Response::new(&mut headers);
    let header_len = match response.parse(bytes).expect("well-formed response") {
        httparse::Status::Complete(n) => n,
        httparse::Status::Partial => panic!("truncated response: {:?}", String::from_utf8_lossy(bytes)),
    };

    RawResponse {
        status: response.code.expect("status code"),
        headers: response
            .headers
            .iter()
            .map(|h| {
                (
                    h.name.to_string(),
                    String::from_utf8_lossy(h.value).into_owned(),
                )
            })
            .collect(),
        body: String::from_utf8_lossy(&bytes[header_len..]).into_owned(),
    }
}

/// Send `segments` with `gap` between them, then read until the server closes.
pub async fn send_segments(addr: SocketAddr, segments: &[&[u8]], gap: Duration) -> RawResponse {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream.set_nodelay(true).expect("nodelay");
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(gap).await;
        }
        stream.write_all(segment).await.expect("write segment");
    }

    let mut reply = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), stream.read_to_end(&mut reply))
        .await
        .expect("server replied in time")
        .expect("read reply");
    parse_response(&reply)
}

/// Send `head`, then stream `body_len` bytes while reading the reply.
///
/// The server may answer before the body is through; the reply must still
/// arrive intact.
pub async fn send_streaming(addr: SocketAddr, head: &[u8], body_len: usize) -> RawResponse {
    let stream = TcpStream::connect(addr).await.expect("connect");
    let (mut reader, mut writer) = stream.into_split();
    let head = head.to_vec();
    let sender = tokio::spawn(async move {
        writer.write_all(&head).await?;
        writer.write_all(&vec![b'7'; body_len]).await?;
        writer.shutdown().await
    });

    let mut reply = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), reader.read_to_end(&mut reply))
        .await
        .expect("server replied in time")
        .expect("read reply");
    // The server may stop listening once it has answered.
    let _ = sender.await.expect("sender task");
    parse_response(&reply)
}

/// Send one raw request in a single write.
pub async fn send_raw(addr: SocketAddr, request: &[u8]) -> RawResponse {
    send_segments(addr, &[request], Duration::ZERO).await
}

pub async fn get(addr: SocketAddr, path: &str) -> RawResponse {
    let request = format!("GET {path} HTTP/1.1\r\nHost: test\r\n\r\n");
    send_raw(addr, request.as_bytes()).await
}

pub async fn put(addr: SocketAddr, path: &str, body: &str) -> RawResponse {
    let request = format!(
        "PUT {path} HTTP/1.1\r\nHost: test\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    send_raw(addr, request.as_bytes()).await
}
