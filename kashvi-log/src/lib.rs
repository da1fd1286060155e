//! Non-blocking batched log shipping for Kashvi.
//!
//! Emitters hand records to an [`AsyncLogSink`] through a bounded queue; a
//! background drainer batches them into a [`LogStore`] (MongoDB behind the
//! `mongo` feature). The hot path never waits on the store: when the queue
//! is full, records are dropped and a counter moves. [`init`] wires the
//! sink into `tracing` alongside the stdout handler, each behind its own
//! level filter.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # struct Noop;
//! # #[async_trait::async_trait]
//! # impl kashvi_log::LogStore for Noop {
//! #     async fn insert_batch(&self, _batch: &[kashvi_log::LogRecord]) -> anyhow::Result<()> {
//! #         Ok(())
//! #     }
//! # }
//! # async fn demo() {
//! use tracing_subscriber::filter::LevelFilter;
//!
//! let sink = Arc::new(kashvi_log::AsyncLogSink::new(Arc::new(Noop)));
//! kashvi_log::init(LevelFilter::DEBUG, Some((Arc::clone(&sink), LevelFilter::INFO)));
//!
//! tracing::info!(request_id = "a1b2c3d4", amount = 99.99, "payment processed");
//!
//! // During graceful shutdown:
//! sink.close().await;
//! # }
//! ```

mod layer;
#[cfg(feature = "mongo")]
mod mongo;
mod record;
mod sink;
mod store;

pub use layer::{init, SinkLayer};
#[cfg(feature = "mongo")]
pub use mongo::{MongoLogConfig, MongoStore};
pub use record::LogRecord;
pub use sink::AsyncLogSink;
pub use store::LogStore;
