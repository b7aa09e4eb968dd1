//! Shutdown coordination for the worker pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use mio::Waker;

#[derive(Default)]
struct Inner {
    triggered: AtomicBool,
    wakers: Mutex<Vec<Arc<Waker>>>,
}

/// Coordinator for graceful shutdown.
///
/// Workers poll a blocking readiness queue, so a flag alone is not enough:
/// each worker registers its queue's waker and `trigger` wakes them all.
#[derive(Clone, Default)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker's waker. Wakes it at once if shutdown already began.
    pub fn register(&self, waker: Arc<Waker>) {
        let mut wakers = self
            .inner
            .wakers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.is_triggered() {
            if let Err(e) = waker.wake() {
                tracing::warn!(error = %e, "Failed to wake worker");
            }
        }
        wakers.push(waker);
    }

    /// Trigger the shutdown signal. Idempotent.
    pub fn trigger(&self) {
        if !self.inner.triggered.swap(true, Ordering::SeqCst) {
            tracing::info!("Shutdown requested");
        }
        let wakers = self
            .inner
            .wakers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for waker in wakers.iter() {
            if let Err(e) = waker.wake() {
                tracing::warn!(error = %e, "Failed to wake worker");
            }
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    /// Number of registered workers.
    pub fn registered(&self) -> usize {
        self.inner
            .wakers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl std::fmt::Debug for Shutdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shutdown")
            .field("triggered", &self.is_triggered())
            .field("registered", &self.registered())
            .finish()
    }
}
