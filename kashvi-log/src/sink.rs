use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::record::LogRecord;
use crate::store::LogStore;

const DEFAULT_QUEUE_CAPACITY: usize = 4096;
const BATCH_SIZE: usize = 50;
const FLUSH_TICK: Duration = Duration::from_secs(2);

/// Non-blocking, batching shipper of log records to a [`LogStore`].
///
/// Records are queued with a non-blocking send and dropped silently when the
/// queue is full; emitting must never wait on the store. A single drainer
/// task writes batches of up to 50 records, or whatever accumulated when the
/// 2-second flush tick fires.
pub struct AsyncLogSink {
    tx: mpsc::Sender<LogRecord>,
    closed: AtomicBool,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    drainer: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    dropped: AtomicU64,
    flushes: Arc<AtomicU64>,
}

impl AsyncLogSink {
    /// A sink with the default queue capacity of 4096 records.
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self::with_capacity(store, DEFAULT_QUEUE_CAPACITY)
    }

    /// `capacity` bounds the emit queue; records beyond it are dropped.
    pub fn with_capacity(store: Arc<dyn LogStore>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let flushes = Arc::new(AtomicU64::new(0));
        let drainer = tokio::spawn(drain_loop(rx, store, shutdown_rx, Arc::clone(&flushes)));

        Self {
            tx,
            closed: AtomicBool::new(false),
            shutdown: Mutex::new(Some(shutdown_tx)),
            drainer: tokio::sync::Mutex::new(Some(drainer)),
            dropped: AtomicU64::new(0),
            flushes,
        }
    }

    /// Queue a record without blocking. When the queue is full, or the sink
    /// has been closed, the record is dropped silently and only the counter
    /// moves.
    pub fn emit(&self, record: LogRecord) {
        if self.closed.load(Ordering::Relaxed) || self.tx.try_send(record).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Drain the queue, flush once more, and stop the drainer. Safe to call
    /// more than once; later calls return immediately.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
        let Some(shutdown) = self.shutdown.lock().take() else {
            return;
        };
        let _ = shutdown.send(());
        if let Some(drainer) = self.drainer.lock().await.take() {
            let _ = drainer.await;
        }
    }

    /// Records dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Batches written (or attempted) against the store.
    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }
}

async fn drain_loop(
    mut rx: mpsc::Receiver<LogRecord>,
    store: Arc<dyn LogStore>,
    mut shutdown: oneshot::Receiver<()>,
    flushes: Arc<AtomicU64>,
) {
    let mut ticker = tokio::time::interval(FLUSH_TICK);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut batch: Vec<LogRecord> = Vec::with_capacity(BATCH_SIZE);

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(record) => {
                    batch.push(record);
                    if batch.len() >= BATCH_SIZE {
                        flush(store.as_ref(), &mut batch, &flushes).await;
                    }
                }
                // Every sender is gone; nothing more can arrive.
                None => {
                    flush(store.as_ref(), &mut batch, &flushes).await;
                    return;
                }
            },
            _ = ticker.tick() => flush(store.as_ref(), &mut batch, &flushes).await,
            _ = &mut shutdown => {
                while let Ok(record) = rx.try_recv() {
                    batch.push(record);
                    if batch.len() >= BATCH_SIZE {
                        flush(store.as_ref(), &mut batch, &flushes).await;
                    }
                }
                flush(store.as_ref(), &mut batch, &flushes).await;
                return;
            }
        }
    }
}

/// Write errors are swallowed: persistent store unavailability shows up as
/// dropped records, not as blocked emitters.
async fn flush(store: &dyn LogStore, batch: &mut Vec<LogRecord>, flushes: &AtomicU64) {
    if batch.is_empty() {
        return;
    }
    let _ = store.insert_batch(batch).await;
    flushes.fetch_add(1, Ordering::Relaxed);
    batch.clear();
}
