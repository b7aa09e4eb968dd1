//! Fixed pool of event-loop threads.
//!
//! Startup is all-or-nothing: every worker reports over a channel once its
//! store, queue and listener registration are in place. The first failure
//! triggers shutdown, joins whatever already started and returns the error.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use crate::lifecycle::shutdown::Shutdown;
use crate::net::{Listener, ListenerError};
use crate::storage::StorageError;
use crate::worker::event_loop::{EventLoop, WorkerContext};

/// Error type for worker operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("worker {worker}: failed to open storage: {source}")]
    Storage {
        worker: usize,
        #[source]
        source: StorageError,
    },
    #[error("worker {worker}: readiness queue failed: {source}")]
    Queue {
        worker: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("worker {worker}: failed to register listener: {source}")]
    Register {
        worker: usize,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("worker {worker} exited before reporting ready")]
    Vanished { worker: usize },
    #[error("worker {worker} panicked")]
    Panicked { worker: usize },
}

type WorkerResult = Result<(), WorkerError>;

/// Running worker threads.
#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<JoinHandle<WorkerResult>>,
}

impl WorkerPool {
    /// Spawn `count` workers sharing `listener` and wait until all are ready.
    pub fn spawn(listener: &Listener, count: usize, ctx: WorkerContext) -> Result<Self, WorkerError> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<usize, WorkerError>>();
        let mut handles = Vec::with_capacity(count);

        for index in 0..count {
            let socket = match listener.clone_for_worker() {
                Ok(socket) => socket,
                Err(e) => return Err(abort(handles, &ctx.shutdown, e.into())),
            };
            let ready = ready_tx.clone();
            let worker_ctx = ctx.clone();

            let spawned = thread::Builder::new()
                .name(format!("fricu-worker-{index}"))
                .spawn(move || {
                    let event_loop = match EventLoop::new(index, socket, worker_ctx) {
                        Ok(event_loop) => event_loop,
                        Err(e) => {
                            let _ = ready.send(Err(e));
                            return Ok(());
                        }
                    };
                    let _ = ready.send(Ok(index));
                    drop(ready);
                    event_loop.run()
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => return Err(abort(handles, &ctx.shutdown, WorkerError::Spawn(e))),
            }
        }
        drop(ready_tx);

        for _ in 0..count {
            match ready_rx.recv() {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(abort(handles, &ctx.shutdown, e)),
                Err(_) => {
                    let worker = first_finished(&handles);
                    return Err(abort(handles, &ctx.shutdown, WorkerError::Vanished { worker }));
                }
            }
        }

        tracing::info!(workers = count, "Worker pool ready");
        Ok(Self { handles })
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to exit. Returns the first failure.
    pub fn join(self) -> WorkerResult {
        let mut outcome = Ok(());
        for (worker, handle) in self.handles.into_iter().enumerate() {
            let result = match handle.join() {
                Ok(result) => result,
                Err(_) => Err(WorkerError::Panicked { worker }),
            };
            if let Err(e) = result {
                tracing::error!(error = %e, "Worker failed");
                if outcome.is_ok() {
                    outcome = Err(e);
                }
            }
        }
        outcome
    }
}

fn first_finished(handles: &[JoinHandle<WorkerResult>]) -> usize {
    handles.iter().position(|h| h.is_finished()).unwrap_or(0)
}

/// Stop and join already-started workers, handing back the startup error.
fn abort(handles: Vec<JoinHandle<WorkerResult>>, shutdown: &Shutdown, error: WorkerError) -> WorkerError {
    tracing::error!(error = %error, started = handles.len(), "Worker startup failed");
    shutdown.trigger();
    for handle in handles {
        let _ = handle.join();
    }
    error
}
