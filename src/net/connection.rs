//! Per-connection state and lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Own the non-blocking socket and its request framer
//! - Drain readable bytes and report what the worker should do next
//! - Count live connections across all workers

use std::io::{self, Read};
use std::net::{Shutdown, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mio::net::TcpStream;

use crate::http::{Handler, Response, Route};
use crate::net::framing::{Progress, RequestFramer};
use crate::observability::metrics;
use crate::resilience::{write_all_with_retry, WriteRetryPolicy};

/// Scratch space for bytes discarded after an early rejection.
const DISCARD_CHUNK: usize = 4096;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is enough: only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Counts connections held by any worker.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        metrics::connection_opened();
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: ConnectionId::new(),
        }
    }

    /// Get current active connection count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements the active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        metrics::connection_closed();
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

/// Result of draining a readable socket.
#[derive(Debug)]
pub enum ReadOutcome {
    /// Socket drained, request still incomplete.
    Pending,
    /// Peer closed before a complete request arrived.
    Closed,
    /// Read failed; drop the connection.
    Failed(io::Error),
    /// Answer with this response without touching storage. The rest of the
    /// request may still be in flight.
    Respond(Response),
    /// Request complete; execute the route against [`Connection::body`].
    Dispatch(Route),
}

/// A client socket owned by exactly one worker.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    framer: RequestFramer,
    accepted_at: Instant,
    last_activity: Instant,
    /// Set once the response is out and the write side is shut.
    draining_since: Option<Instant>,
    guard: ConnectionGuard,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        framer: RequestFramer,
        guard: ConnectionGuard,
    ) -> Self {
        let now = Instant::now();
        Self {
            stream,
            peer,
            framer,
            accepted_at: now,
            last_activity: now,
            draining_since: None,
            guard,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.guard.id()
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    pub fn accepted_at(&self) -> Instant {
        self.accepted_at
    }

    /// Method name for metrics labels; `-` before the head was parsed.
    pub fn method(&self) -> &str {
        self.framer.method().map_or("-", |m| m.as_str())
    }

    /// Body of a dispatched request.
    pub fn body(&self) -> &[u8] {
        self.framer.body()
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    /// Read until the socket would block or a request is complete.
    ///
    /// Readiness is edge-triggered, so returning `Pending` before the kernel
    /// reports `WouldBlock` would stall the connection.
    pub fn read_available(&mut self, handler: &Handler) -> ReadOutcome {
        loop {
            let Some(spare) = self.framer.spare_mut() else {
                return ReadOutcome::Respond(Response::payload_too_large());
            };
            match self.stream.read(spare) {
                Ok(0) => return ReadOutcome::Closed,
                Ok(n) => {
                    self.last_activity = Instant::now();
                    self.framer.commit(n);
                    match self.framer.advance(handler) {
                        Progress::NeedMore => {}
                        Progress::Dispatch(route) => return ReadOutcome::Dispatch(route),
                        Progress::Respond(response) => return ReadOutcome::Respond(response),
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return ReadOutcome::Pending,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return ReadOutcome::Failed(e),
            }
        }
    }

    /// Write the full response. The caller closes the socket afterwards.
    pub fn send(&mut self, response: &Response) -> io::Result<()> {
        write_all_with_retry(
            &mut self.stream,
            &response.encode(),
            WriteRetryPolicy::default(),
        )
    }

    /// Send FIN after an early response and start discarding input.
    ///
    /// Closing a socket with unread bytes makes the kernel answer with RST,
    /// which can destroy the response before the client reads it. The worker
    /// keeps the connection until the peer finishes sending.
    pub fn start_drain(&mut self) -> io::Result<()> {
        self.stream.shutdown(Shutdown::Write)?;
        self.draining_since = Some(Instant::now());
        Ok(())
    }

    pub fn is_draining(&self) -> bool {
        self.draining_since.is_some()
    }

    /// Whether draining has run for at least `linger`.
    pub fn drain_expired(&self, now: Instant, linger: Duration) -> bool {
        self.draining_since
            .is_some_and(|since| now.saturating_duration_since(since) >= linger)
    }

    /// Read and drop whatever the peer sends. Returns `Pending` until EOF.
    pub fn discard_available(&mut self) -> ReadOutcome {
        let mut scratch = [0u8; DISCARD_CHUNK];
        loop {
            match self.stream.read(&mut scratch) {
                Ok(0) => return ReadOutcome::Closed,
                Ok(_) => self.last_activity = Instant::now(),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return ReadOutcome::Pending,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return ReadOutcome::Failed(e),
            }
        }
    }
}
