//! FIFO request queue with a concurrency ceiling.
//!
//! [`RequestQueue`] runs submitted async tasks in submission order, with at
//! most `concurrency` of them executing at once. Each submission returns a
//! future that settles with exactly the task's outcome.
//!
//! # Example
//!
//! ```rust,ignore
//! use media_resolver::RequestQueue;
//!
//! let queue = RequestQueue::new(5);
//! let answer = queue.submit(async { Ok(42) }).await?;
//! assert_eq!(answer, 42);
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::FutureExt;
use tokio::sync::oneshot;

use crate::error::{ResolverError, Result};
use crate::stats::QueueStats;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Job>,
    in_flight: usize,
    closed: bool,
}

struct QueueInner {
    concurrency: usize,
    state: Mutex<QueueState>,
    runtime_handle: tokio::runtime::Handle,
}

impl QueueInner {
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start queued jobs while below the ceiling.
    fn dispatch(self: &Arc<Self>) {
        loop {
            let job = {
                let mut state = self.lock_state();
                if state.in_flight >= self.concurrency {
                    return;
                }
                match state.pending.pop_front() {
                    Some(job) => {
                        state.in_flight += 1;
                        job
                    }
                    None => return,
                }
            };

            let guard = InFlightGuard {
                queue: Arc::clone(self),
            };
            self.runtime_handle.spawn(async move {
                let _guard = guard;
                job.await;
            });
        }
    }
}

/// Decrements `in_flight` and starts the next job when a task ends,
/// however it ends.
struct InFlightGuard {
    queue: Arc<QueueInner>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        {
            let mut state = self.queue.lock_state();
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        self.queue.dispatch();
    }
}

/// FIFO task queue bounded by a concurrency ceiling.
///
/// Tasks start in submission order. Completion order is unconstrained.
/// Tasks run on spawned tokio tasks, so dropping the future returned by
/// [`submit`](Self::submit) does not cancel the work.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct RequestQueue {
    inner: Arc<QueueInner>,
}

impl RequestQueue {
    /// Create a queue running at most `concurrency` tasks at once.
    ///
    /// A ceiling of zero is treated as one.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime context.
    pub fn new(concurrency: usize) -> Self {
        log::debug!(" Creating request queue with concurrency {}", concurrency);
        Self {
            inner: Arc::new(QueueInner {
                concurrency: concurrency.max(1),
                state: Mutex::new(QueueState::default()),
                runtime_handle: tokio::runtime::Handle::current(),
            }),
        }
    }

    /// Enqueue `task` and return a future of its outcome.
    ///
    /// The task is enqueued when `submit` is called, not when the returned
    /// future is first polled.
    ///
    /// # Errors
    ///
    /// The returned future resolves to:
    /// - the task's own `Err`, unchanged;
    /// - [`ResolverError::ShuttingDown`] if the queue was closed before the task started;
    /// - [`ResolverError::Internal`] if the task panicked.
    pub fn submit<F, T>(&self, task: F) -> impl Future<Output = Result<T>> + Send + 'static
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        let job: Job = Box::pin(async move {
            let outcome = AssertUnwindSafe(task)
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    log::error!("❌ Queued task panicked");
                    Err(ResolverError::Internal("queued task panicked".to_string()))
                });
            let _ = tx.send(outcome);
        });

        let rejected = {
            let mut state = self.inner.lock_state();
            if state.closed {
                Some(job)
            } else {
                state.pending.push_back(job);
                None
            }
        };

        match rejected {
            Some(job) => {
                log::debug!(" Request queue closed, rejecting task");
                drop(job);
            }
            None => self.inner.dispatch(),
        }

        async move { rx.await.unwrap_or(Err(ResolverError::ShuttingDown)) }
    }

    /// Current queue statistics.
    pub fn stats(&self) -> QueueStats {
        let state = self.inner.lock_state();
        QueueStats {
            pending: state.pending.len(),
            in_flight: state.in_flight,
            concurrency: self.inner.concurrency,
        }
    }

    /// Stop accepting work and reject every task that has not started.
    ///
    /// Running tasks finish normally. Idempotent.
    pub fn close(&self) {
        let dropped: Vec<Job> = {
            let mut state = self.inner.lock_state();
            state.closed = true;
            state.pending.drain(..).collect()
        };
        if !dropped.is_empty() {
            log::info!(" Request queue closed, rejected {} pending tasks", dropped.len());
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.lock_state().closed
    }
}

impl std::fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestQueue")
            .field("stats", &self.stats())
            .finish()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
