use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::driver::memory::MemoryDriver;
use crate::driver::QueueDriver;
use crate::envelope::Envelope;
use crate::failed::FailedJob;
use crate::job::{AnyJob, JobRegistry};
use crate::metrics::QueueMetrics;
use crate::{Job, QueueError, QueueResult};

/// Delay before retrying a failed driver pop.
const POP_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Settings the queue consumes; resolved by the embedding application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Concurrent worker count for [`QueueManager::start_workers`].
    pub workers: usize,
    /// Retry budget per job.
    pub max_retry: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            max_retry: 3,
        }
    }
}

/// The central queue hub: type registry, storage driver, retry policy, and
/// dead-letter capture.
///
/// Cloning is cheap and every clone operates on the same underlying state.
#[derive(Clone)]
pub struct QueueManager {
    inner: Arc<Inner>,
}

struct Inner {
    registry: RwLock<JobRegistry>,
    driver: RwLock<Arc<dyn QueueDriver>>,
    failed: Mutex<Vec<FailedJob>>,
    max_retry: AtomicU32,
    #[cfg(feature = "postgres")]
    store: RwLock<Option<sqlx::PgPool>>,
    metrics: QueueMetrics,
}

impl QueueManager {
    /// A manager backed by the in-memory driver with a retry budget of 3.
    pub fn new() -> Self {
        Self::with_config(&QueueConfig::default())
    }

    pub fn with_config(config: &QueueConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: RwLock::new(JobRegistry::default()),
                driver: RwLock::new(Arc::new(MemoryDriver::new())),
                failed: Mutex::new(Vec::new()),
                max_retry: AtomicU32::new(config.max_retry.max(1)),
                #[cfg(feature = "postgres")]
                store: RwLock::new(None),
                metrics: QueueMetrics::default(),
            }),
        }
    }

    /// Make `J` available for decoding on dequeue. Registering a name that
    /// already exists replaces the previous factory.
    pub fn register<J: Job>(&self) {
        self.inner.registry.write().register::<J>();
        debug!(job_type = J::NAME, "queue: job type registered");
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.inner.registry.read().contains(type_name)
    }

    pub fn registered_types(&self) -> Vec<String> {
        self.inner.registry.read().type_names()
    }

    /// Swap the storage driver. Safe while workers are running; the next pop
    /// goes to the new driver.
    pub fn set_driver<D: QueueDriver>(&self, driver: D) {
        *self.inner.driver.write() = Arc::new(driver);
    }

    /// Retry budget for subsequently processed jobs. Values below 1 are
    /// coerced to 1.
    pub fn set_max_retry(&self, n: u32) {
        self.inner.max_retry.store(n.max(1), Ordering::Relaxed);
    }

    /// Persist dead-letter records to the `kashvi_failed_jobs` table in
    /// addition to the in-memory list. Creates the table when missing.
    #[cfg(feature = "postgres")]
    pub async fn use_store(&self, pool: sqlx::PgPool) -> QueueResult<()> {
        crate::failed::store::migrate(&pool).await?;
        *self.inner.store.write() = Some(pool);
        Ok(())
    }

    /// Serialize `job` into an envelope and push it for immediate processing.
    pub async fn dispatch<J: Job>(&self, job: &J) -> QueueResult<()> {
        let bytes = Envelope::encode(job)?;
        self.driver().push(bytes).await
    }

    /// Schedule `job` to run no earlier than `delay` from now.
    ///
    /// Drivers with native delayed delivery persist the job immediately. For
    /// the rest, an in-process timer pushes on expiry, so the job is lost if
    /// the process exits first.
    pub async fn dispatch_after<J: Job>(&self, job: &J, delay: Duration) -> QueueResult<()> {
        let bytes = Envelope::encode(job)?;
        let driver = self.driver();
        if driver.capabilities().delayed {
            return driver.push_delayed(bytes, delay).await;
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let driver = { inner.driver.read().clone() };
            if let Err(error) = driver.push(bytes).await {
                error!(%error, "queue: delayed dispatch failed");
            }
        });
        Ok(())
    }

    /// Launch `n` concurrent workers that pop, decode, and run jobs until
    /// `token` fires. Worker counts below 1 are coerced to 1.
    pub fn start_workers(&self, token: CancellationToken, n: usize) {
        let n = n.max(1);
        for _ in 0..n {
            let inner = Arc::clone(&self.inner);
            let token = token.clone();
            tokio::spawn(async move { inner.work(token).await });
        }
        info!(count = n, "queue: workers started");
    }

    /// Snapshot of jobs that exhausted their retry budget.
    pub fn failed_jobs(&self) -> Vec<FailedJob> {
        self.inner.failed.lock().clone()
    }

    pub fn metrics(&self) -> &QueueMetrics {
        &self.inner.metrics
    }

    fn driver(&self) -> Arc<dyn QueueDriver> {
        self.inner.driver.read().clone()
    }
}

impl Default for QueueManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    async fn work(self: Arc<Self>, token: CancellationToken) {
        let mut failing = false;
        loop {
            if token.is_cancelled() {
                return;
            }
            let driver = { self.driver.read().clone() };
            match driver.pop(&token).await {
                Ok(Some(raw)) => {
                    failing = false;
                    self.process(raw).await;
                }
                Ok(None) => failing = false,
                Err(QueueError::Cancelled) => return,
                Err(error) => {
                    // One log line per failure streak, not per iteration.
                    if !failing {
                        warn!(%error, "queue: pop failed, backing off");
                        failing = true;
                    }
                    tokio::select! {
                        _ = token.cancelled() => return,
                        _ = tokio::time::sleep(POP_RETRY_DELAY) => {}
                    }
                }
            }
        }
    }

    async fn process(&self, raw: Vec<u8>) {
        let envelope = match Envelope::decode(&raw) {
            Ok(envelope) => envelope,
            Err(error) => {
                error!(%error, "queue: bad envelope");
                self.metrics.record_dropped();
                return;
            }
        };

        let factory = { self.registry.read().factory(&envelope.type_name) };
        let Some(factory) = factory else {
            // Unknown types are a deployment problem; retrying cannot fix
            // them, so the envelope is discarded.
            warn!(job_type = %envelope.type_name, "queue: unregistered job type");
            self.metrics.record_dropped();
            return;
        };

        let job = match factory(&envelope.payload) {
            Ok(job) => job,
            Err(error) => {
                error!(job_type = %envelope.type_name, %error, "queue: bad payload");
                self.metrics.record_dropped();
                return;
            }
        };

        self.run_with_retry(job.as_ref(), &envelope.type_name, envelope.payload.get())
            .await;
    }

    /// Linear backoff: attempt `k` fails → sleep `k` seconds → attempt
    /// `k + 1`. A panicking handler counts as a failed attempt.
    async fn run_with_retry(&self, job: &dyn AnyJob, job_type: &str, payload: &str) {
        let max_retry = self.max_retry.load(Ordering::Relaxed).max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_retry {
            let started = Instant::now();
            let outcome = match AssertUnwindSafe(job.run()).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(panic) => Err(anyhow::anyhow!(
                    "job panicked: {}",
                    panic_message(panic.as_ref())
                )),
            };

            match outcome {
                Ok(()) => {
                    self.metrics.record_handled(job_type, started.elapsed(), true);
                    info!(job_type, attempt, "queue: job processed");
                    return;
                }
                Err(error) => {
                    self.metrics.record_handled(job_type, started.elapsed(), false);
                    warn!(job_type, attempt, %error, "queue: job failed, retrying");
                    last_error = error.to_string();
                    if attempt < max_retry {
                        tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
                    }
                }
            }
        }

        self.persist_failed(job_type, payload, &last_error, max_retry)
            .await;
        error!(job_type, error = %last_error, "queue: job exhausted retries");
        self.metrics.record_dead_letter();
    }

    async fn persist_failed(&self, job_type: &str, payload: &str, error: &str, attempts: u32) {
        let record = FailedJob {
            job_type: job_type.to_string(),
            payload: payload.to_string(),
            error: error.to_string(),
            attempts,
            failed_at: chrono::Utc::now(),
        };
        self.failed.lock().push(record.clone());

        #[cfg(feature = "postgres")]
        {
            let pool = { self.store.read().clone() };
            if let Some(pool) = pool {
                if let Err(error) = crate::failed::store::insert(&pool, &record).await {
                    // The in-memory list still holds the record.
                    warn!(job_type = %record.job_type, %error, "queue: dead-letter insert failed");
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
