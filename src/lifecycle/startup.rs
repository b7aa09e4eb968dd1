//! Startup orchestration.
//!
//! # Order
//! 1. Raise the open-file limit (best effort)
//! 2. Bind the listening socket
//! 3. Bootstrap the schema on a dedicated connection
//! 4. Spawn the worker pool and wait until every worker is ready
//!
//! Any failure before step 4 completes is fatal and leaves nothing running.

use std::net::SocketAddr;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::http::Handler;
use crate::lifecycle::shutdown::Shutdown;
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::storage::{self, KeySet, StorageError};
use crate::worker::{WorkerContext, WorkerError, WorkerPool};

/// Error type for startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("schema bootstrap failed: {0}")]
    Bootstrap(#[from] StorageError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
}

/// Raise the soft open-file limit towards `target`, bounded by the hard limit.
#[cfg(unix)]
pub fn raise_fd_limit(target: u64) {
    match rlimit::increase_nofile_limit(target) {
        Ok(limit) if limit < target => {
            tracing::warn!(limit, target, "Open-file limit capped by hard limit");
        }
        Ok(limit) => tracing::debug!(limit, "Open-file limit raised"),
        Err(e) => tracing::warn!(error = %e, "Failed to raise open-file limit"),
    }
}

#[cfg(not(unix))]
pub fn raise_fd_limit(_target: u64) {}

/// A running server.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
    pool: WorkerPool,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Ask every worker to stop. Returns immediately; use [`join`](Self::join)
    /// to wait.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Connections currently held by any worker.
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    pub fn workers(&self) -> usize {
        self.pool.len()
    }

    /// Wait for all workers to exit.
    pub fn join(self) -> Result<(), WorkerError> {
        let result = self.pool.join();
        tracing::info!(address = %self.local_addr, "Server stopped");
        result
    }
}

/// Start a server from configuration.
pub fn start(config: &ServerConfig) -> Result<ServerHandle, StartupError> {
    raise_fd_limit(config.listener.fd_limit_target);
    let listener = Listener::from_config(&config.listener)?;
    start_with_listener(listener, config)
}

/// Start a server on an already bound listener.
pub fn start_with_listener(listener: Listener, config: &ServerConfig) -> Result<ServerHandle, StartupError> {
    let keys = KeySet::new(&config.keys);
    storage::bootstrap(&config.storage, &keys)?;

    let workers = config.workers.effective_count();
    if workers != config.workers.count {
        tracing::warn!(requested = config.workers.count, workers, "Worker count clamped");
    }

    let shutdown = Shutdown::new();
    let tracker = ConnectionTracker::new();
    let idle_secs = config.timeouts.idle_secs;
    let ctx = WorkerContext {
        handler: Handler::new(keys, config.limits.max_request_bytes),
        storage: config.storage.clone(),
        limits: config.limits.clone(),
        idle_timeout: (idle_secs > 0).then(|| Duration::from_secs(idle_secs)),
        max_events: config.workers.max_events,
        tracker: tracker.clone(),
        shutdown: shutdown.clone(),
    };

    let pool = WorkerPool::spawn(&listener, workers, ctx)?;
    let local_addr = listener.local_addr();

    tracing::info!(
        address = %local_addr,
        workers,
        database = %config.storage.path,
        "Server started"
    );

    Ok(ServerHandle {
        local_addr,
        shutdown,
        tracker,
        pool,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ListenerConfig;

    fn test_config(dir: &tempfile::TempDir) -> ServerConfig {
        let mut config = ServerConfig::default();
        config.workers.count = 2;
        config.storage.path = dir.path().join("test.db").to_string_lossy().into_owned();
        config
    }

    fn loopback() -> Listener {
        Listener::bind("127.0.0.1:0".parse().unwrap(), &ListenerConfig::default()).unwrap()
    }

    #[test]
    fn starts_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let handle = start_with_listener(loopback(), &test_config(&dir)).unwrap();
        assert_eq!(handle.workers(), 2);
        assert_ne!(handle.local_addr().port(), 0);

        handle.shutdown();
        handle.join().unwrap();
    }

    #[test]
    fn bootstrap_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(&dir);
        config.storage.path = dir.path().join("missing/dir/db").to_string_lossy().into_owned();

        let err = start_with_listener(loopback(), &config).unwrap_err();
        assert!(matches!(err, StartupError::Bootstrap(_)));
    }
}
