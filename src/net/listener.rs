//! TCP listener setup.
//!
//! # Responsibilities
//! - Resolve the configured `host:port`
//! - Create the listening socket with reuse flags and buffer hints
//! - Hand each worker its own duplicate of the socket for registration
//!
//! # Design Decisions
//! - One kernel socket, one descriptor per worker: every worker's readiness
//!   queue sees the same accept backlog
//! - Buffer size hints are best effort; a refused hint is logged, not fatal

use std::net::{SocketAddr, TcpListener as StdTcpListener, ToSocketAddrs};

use socket2::{Domain, Protocol, Socket, Type};

use crate::config::validation::parse_bind_address;
use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("invalid bind address {address:?}: {reason}")]
    Address { address: String, reason: String },
    #[error("failed to resolve {address}: {source}")]
    Resolve {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to duplicate listener: {0}")]
    Clone(#[source] std::io::Error),
}

/// Resolve a `host:port` string to the first matching socket address.
pub fn resolve(bind_address: &str) -> Result<SocketAddr, ListenerError> {
    let parsed = parse_bind_address(bind_address).map_err(|e| ListenerError::Address {
        address: bind_address.to_string(),
        reason: e.to_string(),
    })?;

    (parsed.host.as_str(), parsed.port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            address: bind_address.to_string(),
            source,
        })?
        .next()
        .ok_or_else(|| ListenerError::Address {
            address: bind_address.to_string(),
            reason: "no addresses resolved".to_string(),
        })
}

/// The shared listening socket.
#[derive(Debug)]
pub struct Listener {
    inner: StdTcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Create, configure, bind and listen.
    pub fn bind(addr: SocketAddr, config: &ListenerConfig) -> Result<Self, ListenerError> {
        let bind_err = |source| ListenerError::Bind {
            address: addr,
            source,
        };

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(bind_err)?;
        socket.set_reuse_address(true).map_err(bind_err)?;
        #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
        socket.set_reuse_port(true).map_err(bind_err)?;

        if config.socket_buffer_bytes > 0 {
            if let Err(e) = socket.set_recv_buffer_size(config.socket_buffer_bytes) {
                tracing::warn!(error = %e, "Receive buffer hint refused");
            }
            if let Err(e) = socket.set_send_buffer_size(config.socket_buffer_bytes) {
                tracing::warn!(error = %e, "Send buffer hint refused");
            }
        }

        socket.set_nonblocking(true).map_err(bind_err)?;
        socket.bind(&addr.into()).map_err(bind_err)?;
        let backlog = i32::try_from(config.backlog).unwrap_or(i32::MAX);
        socket.listen(backlog).map_err(bind_err)?;

        let inner: StdTcpListener = socket.into();
        let local_addr = inner.local_addr().map_err(bind_err)?;

        tracing::info!(address = %local_addr, backlog, "Listener bound");

        Ok(Self { inner, local_addr })
    }

    /// Resolve the configured address and bind it.
    pub fn from_config(config: &ListenerConfig) -> Result<Self, ListenerError> {
        Self::bind(resolve(&config.bind_address)?, config)
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Duplicate descriptor for one worker's readiness queue.
    pub fn clone_for_worker(&self) -> Result<mio::net::TcpListener, ListenerError> {
        let dup = self.inner.try_clone().map_err(ListenerError::Clone)?;
        dup.set_nonblocking(true).map_err(ListenerError::Clone)?;
        Ok(mio::net::TcpListener::from_std(dup))
    }
}
