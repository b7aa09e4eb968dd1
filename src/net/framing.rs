//! Incremental request framing.
//!
//! # State Machine
//! ```text
//! ReadingHeaders ──head complete, body needed──▶ ReadingBody { expected }
//!       │                                              │
//!       │ head complete, no body / rejected            │ body complete
//!       ▼                                              ▼
//!  Dispatching ◀───────────────────────────────────────┘
//! ```
//!
//! The framer owns the receive buffer. The buffer starts small and doubles
//! on fill up to the request cap; a request that is still incomplete when the
//! cap is reached is answered with 413.

use std::ops::Range;

use http::Method;

use crate::http::{parse_head, Handler, Prepared, Response, Route};

/// Growable receive buffer with a hard cap.
#[derive(Debug)]
pub struct RequestBuffer {
    data: Vec<u8>,
    len: usize,
    max: usize,
}

impl RequestBuffer {
    pub fn new(initial: usize, max: usize) -> Self {
        Self {
            data: vec![0; initial.min(max).max(1)],
            len: 0,
            max,
        }
    }

    /// Writable tail of the buffer, doubling the allocation when it is full.
    /// `None` once the cap is reached.
    pub fn spare_mut(&mut self) -> Option<&mut [u8]> {
        if self.len == self.data.len() {
            if self.data.len() >= self.max {
                return None;
            }
            let next = self.data.len().saturating_mul(2).min(self.max);
            self.data.resize(next, 0);
        }
        Some(&mut self.data[self.len..])
    }

    /// Mark `n` bytes of the spare region as filled.
    pub fn commit(&mut self, n: usize) {
        self.len = (self.len + n).min(self.data.len());
    }

    pub fn filled(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn is_full(&self) -> bool {
        self.len >= self.max
    }
}

/// Framing phase of a connection.
#[derive(Debug)]
enum Phase {
    ReadingHeaders,
    ReadingBody { route: Route, body: Range<usize> },
    Dispatching { body: Range<usize> },
}

/// What the connection should do after new bytes arrived.
#[derive(Debug, PartialEq, Eq)]
pub enum Progress {
    /// Keep reading.
    NeedMore,
    /// Request complete; run it and reply. The body is [`RequestFramer::body`].
    Dispatch(Route),
    /// Reply with this response without touching storage.
    Respond(Response),
}

/// Per-connection framing state.
#[derive(Debug)]
pub struct RequestFramer {
    buffer: RequestBuffer,
    phase: Phase,
    method: Option<Method>,
}

impl RequestFramer {
    pub fn new(initial: usize, max: usize) -> Self {
        Self {
            buffer: RequestBuffer::new(initial, max),
            phase: Phase::ReadingHeaders,
            method: None,
        }
    }

    pub fn spare_mut(&mut self) -> Option<&mut [u8]> {
        self.buffer.spare_mut()
    }

    pub fn commit(&mut self, n: usize) {
        self.buffer.commit(n);
    }

    pub fn buffer(&self) -> &RequestBuffer {
        &self.buffer
    }

    /// Method of the request, once the head has been parsed.
    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    /// Body bytes of a dispatched request; empty in any other phase.
    pub fn body(&self) -> &[u8] {
        match &self.phase {
            Phase::Dispatching { body } => &self.buffer.filled()[body.clone()],
            _ => &[],
        }
    }

    /// Re-examine the buffer after a read.
    pub fn advance(&mut self, handler: &Handler) -> Progress {
        match std::mem::replace(&mut self.phase, Phase::ReadingHeaders) {
            Phase::ReadingHeaders => self.advance_headers(handler),
            Phase::ReadingBody { route, body } => self.advance_body(route, body),
            Phase::Dispatching { body } => {
                // Bytes after a complete request are ignored.
                self.phase = Phase::Dispatching { body };
                Progress::NeedMore
            }
        }
    }

    fn advance_headers(&mut self, handler: &Handler) -> Progress {
        let head = match parse_head(self.buffer.filled()) {
            Ok(Some(head)) => head,
            Ok(None) => return self.need_more(),
            Err(e) => {
                self.phase = Phase::Dispatching { body: 0..0 };
                return Progress::Respond(Response::bad_request(&e.to_string()));
            }
        };
        self.method = Some(head.method.clone());

        let start = head.header_len;
        match handler.prepare(&head) {
            Prepared::Ready(route) => {
                self.phase = Phase::Dispatching { body: start..start };
                Progress::Dispatch(route)
            }
            Prepared::AwaitBody { route, len } => self.advance_body(route, start..start + len),
            Prepared::Reject(response) => {
                self.phase = Phase::Dispatching { body: start..start };
                Progress::Respond(response)
            }
        }
    }

    fn advance_body(&mut self, route: Route, body: Range<usize>) -> Progress {
        if self.buffer.len() >= body.end {
            self.phase = Phase::Dispatching { body };
            Progress::Dispatch(route)
        } else {
            self.phase = Phase::ReadingBody { route, body };
            self.need_more()
        }
    }

    fn need_more(&self) -> Progress {
        if self.buffer.is_full() {
            Progress::Respond(Response::payload_too_large())
        } else {
            Progress::NeedMore
        }
    }
}
