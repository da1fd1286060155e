//! Bounded async task pool with explicit backpressure.
//!
//! A [`Pool`] caps the number of tasks that run concurrently, which prevents
//! unbounded task creation under bursty load. When all workers are busy and
//! the task buffer is full, [`Pool::submit`] returns [`PoolError::Full`]
//! immediately so the caller can decide to shed, retry, or queue elsewhere.
//!
//! ```no_run
//! # async fn demo() -> Result<(), kashvi_pool::PoolError> {
//! let pool = kashvi_pool::Pool::new(50);
//!
//! pool.submit(async {
//!     // expensive work
//! })?;
//!
//! pool.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Errors surfaced at the submit boundary.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// All workers are busy and the task buffer is at capacity.
    #[error("pool is full")]
    Full,

    /// The pool has been shut down and accepts no further tasks.
    #[error("pool is closed")]
    Closed,
}

type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A fixed-capacity pool of worker tasks.
///
/// The task buffer holds `2 × capacity` entries so short bursts are absorbed
/// without triggering backpressure while queueing stays bounded.
pub struct Pool {
    tx: Mutex<Option<mpsc::Sender<Task>>>,
    closed: CancellationToken,
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
    capacity: usize,
    in_flight: Arc<AtomicUsize>,
    rejected: AtomicU64,
}

impl Pool {
    /// Spawn a pool with `capacity` workers. A capacity of zero is coerced
    /// to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel::<Task>(capacity * 2);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let in_flight = Arc::new(AtomicUsize::new(0));

        let workers: Vec<JoinHandle<()>> = (0..capacity)
            .map(|_| tokio::spawn(worker(Arc::clone(&rx), Arc::clone(&in_flight))))
            .collect();

        Self {
            tx: Mutex::new(Some(tx)),
            closed: CancellationToken::new(),
            workers: tokio::sync::Mutex::new(workers),
            capacity,
            in_flight,
            rejected: AtomicU64::new(0),
        }
    }

    /// Enqueue `task` for execution without blocking.
    ///
    /// Returns [`PoolError::Full`] when the task buffer is at capacity and
    /// [`PoolError::Closed`] after [`shutdown`](Pool::shutdown).
    pub fn submit<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.closed.is_cancelled() {
            return Err(PoolError::Closed);
        }
        let tx = self.tx.lock().clone().ok_or(PoolError::Closed)?;

        match tx.try_send(Box::pin(task)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                Err(PoolError::Full)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(PoolError::Closed),
        }
    }

    /// Enqueue `task`, waiting for a buffer slot if necessary.
    ///
    /// Returns [`PoolError::Closed`] only when the pool shuts down.
    pub async fn submit_wait<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let tx = self.tx.lock().clone().ok_or(PoolError::Closed)?;

        tokio::select! {
            _ = self.closed.cancelled() => Err(PoolError::Closed),
            sent = tx.send(Box::pin(task)) => sent.map_err(|_| PoolError::Closed),
        }
    }

    /// Stop accepting tasks, wait for queued and in-flight tasks to finish,
    /// and release the workers. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.closed.cancel();
        drop(self.tx.lock().take());

        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            let _ = handle.await;
        }
    }

    /// The worker count this pool was built with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of tasks currently executing.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Number of submissions rejected with [`PoolError::Full`].
    pub fn submit_rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

/// Drains the task channel until it is closed and empty.
async fn worker(
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Task>>>,
    in_flight: Arc<AtomicUsize>,
) {
    loop {
        // The receiver lock is released before the task body runs, so the
        // concurrency ceiling is the worker count, not one.
        let task = { rx.lock().await.recv().await };
        let Some(task) = task else { return };

        in_flight.fetch_add(1, Ordering::Relaxed);
        // A panicking task must not take the worker down with it. The caller
        // was answered at submit time, so there is nobody to report to.
        let _ = AssertUnwindSafe(task).catch_unwind().await;
        in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}
