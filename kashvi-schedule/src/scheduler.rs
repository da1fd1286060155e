use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::builder::{EveryBuilder, ScheduleBuilder};
use crate::metrics::ScheduleMetrics;

pub(crate) type TaskFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

pub(crate) enum Frequency {
    Interval(Duration),
    Cron {
        expr: Option<crate::cron::CronExpr>,
        raw: String,
    },
}

impl Frequency {
    fn describe(&self) -> String {
        match self {
            Frequency::Interval(interval) => format!("{interval:?}"),
            Frequency::Cron { raw, .. } => raw.clone(),
        }
    }
}

pub(crate) struct Entry {
    pub id: String,
    pub freq: Frequency,
    pub task: TaskFn,
    pub no_overlap: bool,
    pub before: Option<TaskFn>,
    pub after: Option<TaskFn>,
    pub state: Mutex<EntryState>,
}

#[derive(Default)]
pub(crate) struct EntryState {
    pub running: bool,
    pub last_run: Option<Instant>,
    pub last_fired_minute: Option<i64>,
}

impl Entry {
    fn is_due(&self, wall: DateTime<Local>) -> bool {
        let state = self.state.lock();
        match &self.freq {
            Frequency::Interval(interval) => match state.last_run {
                None => true,
                Some(last) => last.elapsed() >= *interval,
            },
            Frequency::Cron { expr, .. } => {
                let Some(expr) = expr else { return false };
                if !expr.matches(wall) {
                    return false;
                }
                // One fire per matching calendar minute.
                state.last_fired_minute != Some(wall.timestamp() / 60)
            }
        }
    }
}

/// Registry and dispatch loop for interval- and cron-driven tasks.
///
/// ```no_run
/// use tokio_util::sync::CancellationToken;
///
/// let scheduler = kashvi_schedule::Scheduler::new();
///
/// scheduler.every(5).minutes().name("sync-data").run(|| async {
///     tracing::info!("syncing");
/// });
///
/// scheduler
///     .cron("0 3 * * *")
///     .without_overlapping()
///     .name("nightly-backup")
///     .run(|| async {
///         // backup
///     });
///
/// scheduler.start(CancellationToken::new());
/// ```
pub struct Scheduler {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    entries: Mutex<Vec<Arc<Entry>>>,
    metrics: ScheduleMetrics,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(Vec::new()),
                metrics: ScheduleMetrics::default(),
            }),
        }
    }

    /// Start a fluent builder firing every `n` of the unit chosen next.
    pub fn every(&self, n: u64) -> EveryBuilder<'_> {
        EveryBuilder::new(self, n)
    }

    pub fn every_minute(&self) -> ScheduleBuilder<'_> {
        self.every(1).minutes()
    }

    pub fn hourly(&self) -> ScheduleBuilder<'_> {
        self.every(1).hours()
    }

    pub fn daily(&self) -> ScheduleBuilder<'_> {
        self.every(24).hours()
    }

    pub fn weekly(&self) -> ScheduleBuilder<'_> {
        self.every(7).days()
    }

    /// Schedule by a 5-field cron expression (minute, hour, day of month,
    /// month, day of week). An unparsable expression is logged and never
    /// fires.
    pub fn cron(&self, expr: &str) -> ScheduleBuilder<'_> {
        ScheduleBuilder::cron(self, expr)
    }

    /// Launch the dispatch loop. It ticks once per second and exits when
    /// `token` fires.
    pub fn start(&self, token: CancellationToken) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(run(inner, token));
        info!("schedule: scheduler started");
    }

    /// Each entry's id and frequency, formatted for display.
    pub fn list(&self) -> Vec<String> {
        self.inner
            .entries
            .lock()
            .iter()
            .map(|entry| format!("{}  [{}]", entry.id, entry.freq.describe()))
            .collect()
    }

    pub fn metrics(&self) -> &ScheduleMetrics {
        &self.inner.metrics
    }

    pub(crate) fn add(&self, entry: Entry) {
        self.inner.add(entry);
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn add(&self, mut entry: Entry) {
        let mut entries = self.entries.lock();
        if entry.id.is_empty() {
            entry.id = format!("task-{}", entries.len() + 1);
        }
        entries.push(Arc::new(entry));
    }

    fn dispatch(&self, entry: Arc<Entry>) {
        {
            let mut state = entry.state.lock();
            if entry.no_overlap && state.running {
                drop(state);
                warn!(id = %entry.id, "schedule: skipping overlapping task");
                self.metrics.record_skip(&entry.id);
                return;
            }
            state.running = true;
            state.last_run = Some(Instant::now());
            state.last_fired_minute = Some(Local::now().timestamp() / 60);
        }
        self.metrics.record_fire(&entry.id);

        tokio::spawn(async move {
            let body = async {
                if let Some(before) = &entry.before {
                    before().await;
                }
                info!(id = %entry.id, "schedule: running task");
                (entry.task)().await;
            };
            let outcome = AssertUnwindSafe(body).catch_unwind().await;

            entry.state.lock().running = false;
            if let Err(panic) = outcome {
                error!(
                    id = %entry.id,
                    panic = %panic_message(panic.as_ref()),
                    "schedule: task panicked"
                );
            }
            // Fires even when the task panicked.
            if let Some(after) = &entry.after {
                after().await;
            }
        });
    }
}

async fn run(inner: Arc<Inner>, token: CancellationToken) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!("schedule: scheduler stopped");
                return;
            }
            _ = ticker.tick() => {}
        }

        let wall = Local::now();
        let entries: Vec<Arc<Entry>> = inner.entries.lock().clone();
        for entry in entries {
            if entry.is_due(wall) {
                inner.dispatch(entry);
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
