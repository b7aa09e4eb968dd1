//! One worker's event loop.
//!
//! # State
//! ```text
//! connections: Token → Connection   (owned exclusively by this thread)
//! next_token:  monotonic, skips LISTENER / WAKER and live tokens
//! ```
//!
//! # Cleanup Order
//! A connection leaves the map, is deregistered, then dropped (which closes
//! the socket). Each step happens once, synchronously, so a recycled
//! descriptor number can never reach a stale entry.
//!
//! A request answered before it was fully read (400/404/405/413) is not
//! dropped right away: the write side is shut and input is discarded until
//! EOF or [`DRAIN_LINGER`], so unread bytes never turn into a reset that
//! destroys the response.

use std::collections::HashMap;
use std::io;
use std::time::{Duration, Instant};

use mio::net::TcpListener;
use mio::Token;

use crate::config::{LimitsConfig, StorageConfig};
use crate::http::{Handler, Response};
use crate::lifecycle::shutdown::Shutdown;
use crate::net::{Connection, ConnectionTracker, ReadOutcome, RequestFramer};
use crate::observability::metrics;
use crate::storage::WorkerStore;
use crate::worker::poller::{Readiness, ReadinessQueue, LISTENER, WAKER};
use crate::worker::WorkerError;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound on discarding input after an early response.
pub const DRAIN_LINGER: Duration = Duration::from_secs(2);

/// Everything a worker needs besides its listener descriptor.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub handler: Handler,
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
    /// `None` disables the idle sweep.
    pub idle_timeout: Option<Duration>,
    pub max_events: usize,
    pub tracker: ConnectionTracker,
    pub shutdown: Shutdown,
}

/// How often idle connections are swept for a given timeout.
fn sweep_interval(idle_timeout: Duration) -> Duration {
    (idle_timeout / 4).clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL)
}

pub struct EventLoop {
    index: usize,
    queue: ReadinessQueue,
    listener: TcpListener,
    store: WorkerStore,
    ctx: WorkerContext,
    connections: HashMap<Token, Connection>,
    next_token: usize,
    last_sweep: Instant,
    /// Accept stopped on an error other than `WouldBlock`; the backlog may
    /// still hold connections that no new edge will announce.
    accept_pending: bool,
}

impl EventLoop {
    /// Open the worker's store and queue, register the listener and the
    /// shutdown waker. Any failure here aborts startup.
    pub fn new(index: usize, mut listener: TcpListener, ctx: WorkerContext) -> Result<Self, WorkerError> {
        let store = WorkerStore::open(&ctx.storage)
            .map_err(|source| WorkerError::Storage { worker: index, source })?;
        let queue = ReadinessQueue::new(ctx.max_events)
            .map_err(|source| WorkerError::Queue { worker: index, source })?;
        queue
            .register_listener(&mut listener)
            .map_err(|source| WorkerError::Register { worker: index, source })?;
        let waker = queue
            .waker()
            .map_err(|source| WorkerError::Queue { worker: index, source })?;
        ctx.shutdown.register(waker);

        tracing::debug!(worker = index, "Worker initialized");

        Ok(Self {
            index,
            queue,
            listener,
            store,
            ctx,
            connections: HashMap::new(),
            next_token: 1,
            last_sweep: Instant::now(),
            accept_pending: false,
        })
    }

    /// Serve until shutdown is triggered.
    pub fn run(mut self) -> Result<(), WorkerError> {
        let mut ready: Vec<Readiness> = Vec::with_capacity(self.ctx.max_events);

        while !self.ctx.shutdown.is_triggered() {
            if let Err(source) = self.turn(&mut ready) {
                self.close_all();
                return Err(WorkerError::Queue {
                    worker: self.index,
                    source,
                });
            }
        }

        self.close_all();
        tracing::debug!(worker = self.index, "Worker stopped");
        Ok(())
    }

    /// One wait plus the work it uncovered.
    fn turn(&mut self, ready: &mut Vec<Readiness>) -> io::Result<()> {
        let sweep_every = self
            .ctx
            .idle_timeout
            .map_or(MAX_SWEEP_INTERVAL, sweep_interval);
        // Pending accepts are retried on a short tick instead of waiting for
        // an edge that may never come.
        let timeout = if self.accept_pending {
            MIN_SWEEP_INTERVAL
        } else {
            sweep_every
        };
        self.queue.wait(ready, Some(timeout))?;

        let mut listener_ready = false;
        for readiness in ready.iter() {
            match readiness.token {
                WAKER => {}
                LISTENER => listener_ready = true,
                token => self.on_client_ready(token, readiness),
            }
        }
        if listener_ready || self.accept_pending {
            self.accept_all();
        }

        let now = Instant::now();
        if now.saturating_duration_since(self.last_sweep) >= sweep_every {
            self.sweep(now);
            self.last_sweep = now;
        }
        Ok(())
    }

    fn next_token(&mut self) -> Token {
        loop {
            let candidate = Token(self.next_token);
            self.next_token = self.next_token.wrapping_add(1);
            if candidate != LISTENER && candidate != WAKER && !self.connections.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Accept until the backlog is drained. Other workers woken for the same
    /// connection simply find `WouldBlock`.
    fn accept_all(&mut self) {
        self.accept_pending = false;
        loop {
            match self.listener.accept() {
                Ok((mut stream, peer)) => {
                    metrics::record_accepted();
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!(worker = self.index, %peer, error = %e, "Failed to set TCP_NODELAY");
                    }

                    let token = self.next_token();
                    if let Err(e) = self.queue.register_client(&mut stream, token) {
                        tracing::warn!(worker = self.index, %peer, error = %e, "Failed to register client");
                        metrics::record_rejected("register_failed");
                        continue;
                    }

                    let framer = RequestFramer::new(
                        self.ctx.limits.initial_buffer_bytes,
                        self.ctx.limits.max_request_bytes,
                    );
                    let conn = Connection::new(stream, peer, framer, self.ctx.tracker.track());
                    tracing::trace!(worker = self.index, connection_id = %conn.id(), %peer, "Connection accepted");
                    self.connections.insert(token, conn);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    // Typically EMFILE/ENFILE; retried on the next tick.
                    tracing::warn!(worker = self.index, error = %e, "Accept failed");
                    metrics::record_rejected("accept_failed");
                    self.accept_pending = true;
                    break;
                }
            }
        }
    }

    fn on_client_ready(&mut self, token: Token, readiness: &Readiness) {
        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };

        if readiness.is_error_event() {
            self.close(token, "socket_error");
            return;
        }
        if conn.is_draining() {
            self.drain(token);
            return;
        }

        match conn.read_available(&self.ctx.handler) {
            ReadOutcome::Pending => {}
            ReadOutcome::Closed => self.close(token, "peer_closed"),
            ReadOutcome::Failed(e) => {
                tracing::debug!(worker = self.index, connection_id = %conn.id(), error = %e, "Read failed");
                self.close(token, "read_failed");
            }
            ReadOutcome::Respond(response) => {
                if self.respond(token, &response) {
                    self.linger(token);
                } else {
                    self.finish(token);
                }
            }
            ReadOutcome::Dispatch(route) => {
                let response = self.ctx.handler.execute(&route, conn.body(), &self.store);
                self.respond(token, &response);
                self.finish(token);
            }
        }
    }

    /// Write the response. Returns whether it went out in full.
    fn respond(&mut self, token: Token, response: &Response) -> bool {
        let Some(conn) = self.connections.get_mut(&token) else {
            return false;
        };

        let sent = match conn.send(response) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(worker = self.index, connection_id = %conn.id(), error = %e, "Write failed");
                metrics::record_rejected("write_failed");
                false
            }
        };
        metrics::record_request(conn.method(), response.status().as_u16(), conn.accepted_at());
        tracing::debug!(
            worker = self.index,
            connection_id = %conn.id(),
            peer = %conn.peer(),
            method = conn.method(),
            status = response.status().as_u16(),
            "Request served"
        );
        sent
    }

    /// Keep an early-answered connection until the peer stops sending.
    fn linger(&mut self, token: Token) {
        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };
        if let Err(e) = conn.start_drain() {
            tracing::debug!(worker = self.index, connection_id = %conn.id(), error = %e, "Shutdown failed");
            self.finish(token);
            return;
        }
        // Bytes already buffered raise no new edge.
        self.drain(token);
    }

    fn drain(&mut self, token: Token) {
        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };
        match conn.discard_available() {
            ReadOutcome::Pending => {}
            ReadOutcome::Failed(e) => {
                tracing::trace!(worker = self.index, connection_id = %conn.id(), error = %e, "Drain ended");
                self.finish(token);
            }
            _ => self.finish(token),
        }
    }

    /// Release a connection whose exchange is over.
    fn finish(&mut self, token: Token) {
        if let Some(conn) = self.connections.remove(&token) {
            self.release(conn);
        }
    }

    /// Drop a connection without responding.
    fn close(&mut self, token: Token, reason: &'static str) {
        if let Some(conn) = self.connections.remove(&token) {
            tracing::trace!(worker = self.index, connection_id = %conn.id(), reason, "Connection dropped");
            metrics::record_rejected(reason);
            self.release(conn);
        }
    }

    fn release(&self, mut conn: Connection) {
        if let Err(e) = self.queue.deregister(conn.stream_mut()) {
            tracing::debug!(worker = self.index, connection_id = %conn.id(), error = %e, "Deregister failed");
        }
        drop(conn);
    }

    /// Close idle connections and drains that outlived [`DRAIN_LINGER`].
    fn sweep(&mut self, now: Instant) {
        let idle_timeout = self.ctx.idle_timeout;
        let expired: Vec<(Token, &'static str)> = self
            .connections
            .iter()
            .filter_map(|(token, conn)| {
                if conn.drain_expired(now, DRAIN_LINGER) {
                    Some((*token, "drain_timeout"))
                } else if idle_timeout.is_some_and(|timeout| conn.idle_for(now) >= timeout) {
                    Some((*token, "idle_timeout"))
                } else {
                    None
                }
            })
            .collect();

        if !expired.is_empty() {
            tracing::debug!(worker = self.index, count = expired.len(), "Closing expired connections");
        }
        for (token, reason) in expired {
            self.close(token, reason);
        }
    }

    fn close_all(&mut self) {
        let open = self.connections.len();
        for (_, conn) in std::mem::take(&mut self.connections) {
            self.release(conn);
        }
        if let Err(e) = self.queue.deregister(&mut self.listener) {
            tracing::debug!(worker = self.index, error = %e, "Listener deregister failed");
        }
        if open > 0 {
            tracing::debug!(worker = self.index, open, "Closed open connections");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{bootstrap, KeySet};

    #[test]
    fn sweep_interval_is_bounded() {
        assert_eq!(sweep_interval(Duration::from_secs(30)), MAX_SWEEP_INTERVAL);
        assert_eq!(sweep_interval(Duration::from_secs(1)), Duration::from_millis(250));
        assert_eq!(sweep_interval(Duration::from_millis(1)), MIN_SWEEP_INTERVAL);
    }

    fn event_loop(dir: &tempfile::TempDir) -> (EventLoop, std::net::SocketAddr) {
        let storage = StorageConfig {
            path: dir.path().join("loop.db").display().to_string(),
            ..StorageConfig::default()
        };
        let keys = KeySet::default();
        bootstrap(&storage, &keys).unwrap();

        let ctx = WorkerContext {
            handler: Handler::new(keys, 65_536),
            storage,
            limits: LimitsConfig::default(),
            idle_timeout: None,
            max_events: 64,
            tracker: ConnectionTracker::new(),
            shutdown: Shutdown::new(),
        };
        let listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        (EventLoop::new(0, listener, ctx).unwrap(), addr)
    }

    #[test]
    fn pending_accepts_are_retried_without_a_new_edge() {
        let dir = tempfile::tempdir().unwrap();
        let (mut event_loop, addr) = event_loop(&dir);
        let _client = std::net::TcpStream::connect(addr).unwrap();

        // Swallow the listener edge without accepting, as a failed accept would.
        let mut ready = Vec::new();
        for _ in 0..50 {
            event_loop.queue.wait(&mut ready, Some(Duration::from_millis(100))).unwrap();
            if ready.iter().any(|r| r.token == LISTENER) {
                break;
            }
        }
        assert!(event_loop.connections.is_empty());

        event_loop.accept_pending = true;
        event_loop.turn(&mut ready).unwrap();
        assert_eq!(event_loop.connections.len(), 1);
        assert!(!event_loop.accept_pending);
    }

    #[test]
    fn early_rejection_lingers_until_peer_closes() {
        use std::io::{Read, Write};

        let dir = tempfile::tempdir().unwrap();
        let (mut event_loop, addr) = event_loop(&dir);
        let mut client = std::net::TcpStream::connect(addr).unwrap();
        client
            .write_all(b"PUT /v1/data/secrets HTTP/1.1\r\nContent-Length: 4\r\n\r\n")
            .unwrap();

        let mut ready = Vec::new();
        let mut reply = Vec::new();
        client.set_nonblocking(true).unwrap();
        for _ in 0..100 {
            event_loop.turn(&mut ready).unwrap();
            let mut chunk = [0u8; 256];
            match client.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => reply.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => panic!("read failed: {e}"),
            }
        }
        assert!(String::from_utf8_lossy(&reply).starts_with("HTTP/1.1 404 "));
        assert_eq!(event_loop.connections.len(), 1, "held while the body is in flight");

        client.write_all(b"[1]\n").unwrap();
        drop(client);
        for _ in 0..100 {
            event_loop.turn(&mut ready).unwrap();
            if event_loop.connections.is_empty() {
                return;
            }
        }
        panic!("drained connection never released");
    }
}
