//! Readiness queue wrapper.
//!
//! Thin layer over `mio::Poll` so the event loop deals in plain
//! [`Readiness`] values and never touches `mio::Events` directly.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use mio::event::Source;
use mio::{Events, Interest, Poll, Token, Waker};

/// Token of the worker's listener registration.
pub const LISTENER: Token = Token(0);

/// Token of the shutdown waker.
pub const WAKER: Token = Token(usize::MAX);

/// One readiness notification, copied out of the event buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub token: Token,
    pub readable: bool,
    pub error: bool,
}

impl Readiness {
    /// Error events close the connection without reading.
    ///
    /// A read-closed event is not an error: the peer may have sent a full
    /// request and half-closed, so the bytes are still read.
    pub fn is_error_event(&self) -> bool {
        self.error
    }
}

/// Per-worker readiness queue.
pub struct ReadinessQueue {
    poll: Poll,
    events: Events,
}

impl ReadinessQueue {
    pub fn new(max_events: usize) -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(max_events.max(1)),
        })
    }

    /// Create the waker other threads use to interrupt [`wait`](Self::wait).
    pub fn waker(&self) -> io::Result<Arc<Waker>> {
        Ok(Arc::new(Waker::new(self.poll.registry(), WAKER)?))
    }

    pub fn register_listener<S: Source + ?Sized>(&self, listener: &mut S) -> io::Result<()> {
        self.poll
            .registry()
            .register(listener, LISTENER, Interest::READABLE)
    }

    pub fn register_client<S: Source + ?Sized>(&self, stream: &mut S, token: Token) -> io::Result<()> {
        self.poll
            .registry()
            .register(stream, token, Interest::READABLE)
    }

    pub fn deregister<S: Source + ?Sized>(&self, source: &mut S) -> io::Result<()> {
        self.poll.registry().deregister(source)
    }

    /// Block until events arrive or `timeout` elapses, replacing `out`.
    ///
    /// A signal interrupting the wait yields an empty batch.
    pub fn wait(&mut self, out: &mut Vec<Readiness>, timeout: Option<Duration>) -> io::Result<()> {
        out.clear();
        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(()),
            Err(e) => return Err(e),
        }
        out.extend(self.events.iter().map(|event| Readiness {
            token: event.token(),
            readable: event.is_readable(),
            error: event.is_error(),
        }));
        Ok(())
    }
}
