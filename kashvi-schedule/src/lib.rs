//! Cron-style task scheduling for Kashvi.
//!
//! Tasks are registered through a fluent builder, either at a fixed interval
//! or against a 5-field cron expression, and dispatched by a loop that ticks
//! once per second. Entries marked `without_overlapping` never run twice
//! concurrently; `before`/`after` hooks bracket every run, and a panicking
//! task is contained and logged without disturbing the loop.
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//!
//! let scheduler = kashvi_schedule::Scheduler::new();
//!
//! scheduler.every_minute().name("tick").run(|| async {
//!     tracing::info!("tick");
//! });
//!
//! scheduler
//!     .cron("*/5 * * * *")
//!     .without_overlapping()
//!     .name("sync-data")
//!     .run(|| async {
//!         // sync
//!     });
//!
//! scheduler.start(CancellationToken::new());
//! ```

mod builder;
mod cron;
mod metrics;
mod scheduler;

pub use builder::{EveryBuilder, ScheduleBuilder};
pub use cron::{CronExpr, CronParseError};
pub use metrics::ScheduleMetrics;
pub use scheduler::Scheduler;
