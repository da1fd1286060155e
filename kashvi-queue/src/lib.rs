//! Background job processing for Kashvi.
//!
//! Jobs are plain serde types with a stable name and an async `handle`
//! method. Dispatching serializes the job into a `{type, payload}` envelope
//! and hands it to the active driver; workers pop envelopes, decode them
//! through the type registry, and run them with linear retry backoff. Jobs
//! that exhaust their retry budget are captured as dead letters, in memory
//! and optionally in a `kashvi_failed_jobs` table.
//!
//! ```no_run
//! use kashvi_queue::{Job, QueueManager};
//! use serde::{Deserialize, Serialize};
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Serialize, Deserialize)]
//! struct WelcomeEmail {
//!     user_id: u64,
//! }
//!
//! #[async_trait::async_trait]
//! impl Job for WelcomeEmail {
//!     const NAME: &'static str = "welcome_email";
//!
//!     async fn handle(&self) -> anyhow::Result<()> {
//!         tracing::info!(user_id = self.user_id, "sending welcome email");
//!         Ok(())
//!     }
//! }
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let queue = QueueManager::new();
//! queue.register::<WelcomeEmail>();
//! queue.start_workers(CancellationToken::new(), 5);
//!
//! queue.dispatch(&WelcomeEmail { user_id: 1 }).await?;
//! queue
//!     .dispatch_after(&WelcomeEmail { user_id: 2 }, std::time::Duration::from_secs(30))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod driver;
mod envelope;
mod error;
mod failed;
mod job;
mod manager;
mod metrics;

pub use driver::memory::MemoryDriver;
#[cfg(feature = "redis")]
pub use driver::redis::RedisDriver;
pub use driver::{DriverCapabilities, QueueDriver};
pub use error::{QueueError, QueueResult};
pub use failed::FailedJob;
pub use job::Job;
pub use manager::{QueueConfig, QueueManager};
pub use metrics::{HandleStats, QueueMetrics};
