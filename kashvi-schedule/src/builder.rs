use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tracing::warn;

use crate::cron::CronExpr;
use crate::scheduler::{Entry, EntryState, Frequency, Scheduler, TaskFn};

fn boxed<F, Fut>(f: F) -> TaskFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move || -> BoxFuture<'static, ()> { Box::pin(f()) })
}

/// Unit selector following [`Scheduler::every`].
pub struct EveryBuilder<'a> {
    scheduler: &'a Scheduler,
    n: u64,
}

impl<'a> EveryBuilder<'a> {
    pub(crate) fn new(scheduler: &'a Scheduler, n: u64) -> Self {
        Self { scheduler, n }
    }

    pub fn seconds(self) -> ScheduleBuilder<'a> {
        let n = self.n;
        self.interval(Duration::from_secs(n))
    }

    pub fn minutes(self) -> ScheduleBuilder<'a> {
        let n = self.n;
        self.interval(Duration::from_secs(n * 60))
    }

    pub fn hours(self) -> ScheduleBuilder<'a> {
        let n = self.n;
        self.interval(Duration::from_secs(n * 3600))
    }

    pub fn days(self) -> ScheduleBuilder<'a> {
        let n = self.n;
        self.interval(Duration::from_secs(n * 86_400))
    }

    fn interval(self, interval: Duration) -> ScheduleBuilder<'a> {
        ScheduleBuilder::new(self.scheduler, Frequency::Interval(interval))
    }
}

/// Collects an entry's frequency, overlap policy, hooks, and identifier
/// before [`run`](ScheduleBuilder::run) commits it to the registry.
pub struct ScheduleBuilder<'a> {
    scheduler: &'a Scheduler,
    freq: Frequency,
    id: Option<String>,
    no_overlap: bool,
    before: Option<TaskFn>,
    after: Option<TaskFn>,
}

impl<'a> ScheduleBuilder<'a> {
    pub(crate) fn new(scheduler: &'a Scheduler, freq: Frequency) -> Self {
        Self {
            scheduler,
            freq,
            id: None,
            no_overlap: false,
            before: None,
            after: None,
        }
    }

    pub(crate) fn cron(scheduler: &'a Scheduler, raw: &str) -> Self {
        let expr = match CronExpr::parse(raw) {
            Ok(expr) => Some(expr),
            Err(error) => {
                warn!(expr = raw, %error, "schedule: invalid cron expression, entry will never fire");
                None
            }
        };
        Self::new(
            scheduler,
            Frequency::Cron {
                expr,
                raw: raw.to_string(),
            },
        )
    }

    /// Prevent a new run while the previous one is still executing.
    pub fn without_overlapping(mut self) -> Self {
        self.no_overlap = true;
        self
    }

    /// Hook fired before each run of the task.
    pub fn before<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.before = Some(boxed(f));
        self
    }

    /// Hook fired after each run, even when the task panics.
    pub fn after<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.after = Some(boxed(f));
        self
    }

    /// Identifier used in log messages and listings. Unnamed entries get a
    /// generated `task-N` id.
    pub fn name(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Commit the entry to the registry. Dispatch begins once the scheduler
    /// is started.
    pub fn run<F, Fut>(self, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.scheduler.add(Entry {
            id: self.id.unwrap_or_default(),
            freq: self.freq,
            task: boxed(f),
            no_overlap: self.no_overlap,
            before: self.before,
            after: self.after,
            state: Mutex::new(EntryState::default()),
        });
    }
}
