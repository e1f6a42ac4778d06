//! Event loop and two-phase work dispatcher.
//!
//! The [`EventLoop`] is the single-threaded host: a current-thread tokio
//! runtime driving a [`LocalSet`]. Blocking work is offloaded to the runtime's
//! blocking pool, bounded by `worker_threads`.
//!
//! Each offloaded request goes through two phases:
//! - **before** ([`Work::before`]): runs on a pool thread, touches only the
//!   request's own data and the native handles it references.
//! - **after**: runs on the loop thread as a local task, receives the request
//!   back by value (or the scheduling failure), settles its completion and
//!   drops whatever the request still owns.
//!
//! The request is moved into the worker closure and moved back out as its
//! return value, so only the phase currently holding it can reach it.

use std::cell::Cell;
use std::future::Future;
use std::rc::Rc;

use thiserror::Error;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::LocalSet;

use crate::bridge::BridgeError;
use crate::config::DispatcherConfig;

/// Failures of the offload mechanism itself, as opposed to engine failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// Too many requests in flight.
    #[error("work queue is full ({capacity} requests pending)")]
    QueueFull { capacity: usize },

    /// The before-phase panicked on its worker.
    #[error("worker panicked: {0}")]
    Panicked(String),

    /// The worker pool shut down before the before-phase finished.
    #[error("worker cancelled: {0}")]
    Cancelled(String),
}

impl From<SchedulerError> for BridgeError {
    fn from(e: SchedulerError) -> Self {
        BridgeError::SchedulerFailed(e.to_string())
    }
}

/// A unit of offloaded work.
pub trait Work: Send + 'static {
    /// Before-phase. Runs on a worker thread and must not touch the host loop.
    fn before(&mut self);
}

// =============================================================================
// Event Loop
// =============================================================================

/// Single-threaded host loop plus its bounded blocking pool.
pub struct EventLoop {
    runtime: Runtime,
    local: Rc<LocalSet>,
    pending: Rc<Cell<usize>>,
    queue_capacity: usize,
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("pending", &self.pending.get())
            .field("queue_capacity", &self.queue_capacity)
            .finish_non_exhaustive()
    }
}

impl EventLoop {
    /// Build the loop and its worker pool.
    ///
    /// # Errors
    /// Returns `SchedulerFailed` if the pool is empty or the runtime cannot be
    /// started.
    pub fn new(config: &DispatcherConfig) -> Result<Self, BridgeError> {
        if config.worker_threads == 0 {
            return Err(BridgeError::SchedulerFailed(
                "worker pool needs at least one thread".to_string(),
            ));
        }

        let runtime = Builder::new_current_thread()
            .enable_all()
            .max_blocking_threads(config.worker_threads)
            .thread_keep_alive(config.thread_keep_alive)
            .thread_name(config.thread_name.clone())
            .build()
            .map_err(|e| BridgeError::SchedulerFailed(format!("failed to start event loop: {e}")))?;

        tracing::debug!(
            worker_threads = config.worker_threads,
            queue_capacity = config.queue_capacity,
            "Event loop started"
        );

        Ok(Self {
            runtime,
            local: Rc::new(LocalSet::new()),
            pending: Rc::new(Cell::new(0)),
            queue_capacity: config.queue_capacity,
        })
    }

    /// Dispatcher bound to this loop. Every dispatcher of one loop shares its
    /// pending counter, so `queue_capacity` bounds the loop as a whole.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher {
            handle: self.runtime.handle().clone(),
            local: Rc::clone(&self.local),
            pending: Rc::clone(&self.pending),
            capacity: self.queue_capacity,
        }
    }

    /// Drive the loop until `future` completes. After-phases only run while the
    /// loop is being driven, so completions must be awaited from in here.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.local.block_on(&self.runtime, future)
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Queues two-phase work from the loop thread.
///
/// Cheap to clone. All dispatchers of one loop share its pending counter.
/// Not `Send`: a dispatcher belongs to the loop that created it.
#[derive(Clone)]
pub struct Dispatcher {
    handle: Handle,
    local: Rc<LocalSet>,
    pending: Rc<Cell<usize>>,
    capacity: usize,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pending", &self.pending.get())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Run `work.before()` on a worker, then `after` on the loop thread.
    ///
    /// `after` runs exactly once: with the request after its before-phase
    /// completed, or with the scheduling failure. Even a rejected dispatch is
    /// reported through `after`, never by panicking or returning early.
    pub fn queue_work<W, A>(&self, mut work: W, after: A)
    where
        W: Work,
        A: FnOnce(Result<W, SchedulerError>) + 'static,
    {
        if self.pending.get() >= self.capacity {
            tracing::warn!(capacity = self.capacity, "Work queue full, rejecting request");
            let capacity = self.capacity;
            self.local.spawn_local(async move {
                after(Err(SchedulerError::QueueFull { capacity }));
            });
            return;
        }

        self.pending.set(self.pending.get() + 1);
        let worker = self.handle.spawn_blocking(move || {
            work.before();
            work
        });

        let pending = Rc::clone(&self.pending);
        self.local.spawn_local(async move {
            let status = worker.await.map_err(|e| {
                if e.is_panic() {
                    SchedulerError::Panicked(e.to_string())
                } else {
                    SchedulerError::Cancelled(e.to_string())
                }
            });
            pending.set(pending.get().saturating_sub(1));
            after(status);
        });
    }

    /// Requests dispatched on this loop whose after-phase has not run yet.
    pub fn pending(&self) -> usize {
        self.pending.get()
    }

    /// Maximum requests in flight on this loop.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
