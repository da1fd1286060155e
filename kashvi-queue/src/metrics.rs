use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

/// Counters and per-type timings for processed jobs.
#[derive(Default)]
pub struct QueueMetrics {
    succeeded: AtomicU64,
    failed_attempts: AtomicU64,
    dead_lettered: AtomicU64,
    dropped: AtomicU64,
    handle_stats: Mutex<HashMap<String, HandleStats>>,
}

/// Aggregate handle durations for one job type.
#[derive(Debug, Clone, Default)]
pub struct HandleStats {
    pub count: u64,
    pub total: Duration,
    pub max: Duration,
}

impl HandleStats {
    pub fn average(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total / self.count as u32
        }
    }
}

impl QueueMetrics {
    pub(crate) fn record_handled(&self, job_type: &str, duration: Duration, ok: bool) {
        if ok {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_attempts.fetch_add(1, Ordering::Relaxed);
        }

        let mut stats = self.handle_stats.lock();
        let entry = stats.entry(job_type.to_string()).or_default();
        entry.count += 1;
        entry.total += duration;
        entry.max = entry.max.max(duration);
    }

    pub(crate) fn record_dead_letter(&self) {
        self.dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Jobs whose handler returned success.
    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    /// Individual failed attempts, including ones that were later retried
    /// successfully.
    pub fn failed_attempts(&self) -> u64 {
        self.failed_attempts.load(Ordering::Relaxed)
    }

    /// Jobs that exhausted their retry budget.
    pub fn dead_lettered(&self) -> u64 {
        self.dead_lettered.load(Ordering::Relaxed)
    }

    /// Envelopes discarded without an attempt: unknown type, bad envelope,
    /// or undecodable payload.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Handle-duration aggregates for `job_type`, if any attempt ran.
    pub fn handle_stats(&self, job_type: &str) -> Option<HandleStats> {
        self.handle_stats.lock().get(job_type).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_outcomes_and_durations() {
        let metrics = QueueMetrics::default();

        metrics.record_handled("sync", Duration::from_millis(100), false);
        metrics.record_handled("sync", Duration::from_millis(300), true);
        metrics.record_dead_letter();
        metrics.record_dropped();

        assert_eq!(metrics.succeeded(), 1);
        assert_eq!(metrics.failed_attempts(), 1);
        assert_eq!(metrics.dead_lettered(), 1);
        assert_eq!(metrics.dropped(), 1);

        let stats = metrics.handle_stats("sync").unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.max, Duration::from_millis(300));
        assert_eq!(stats.average(), Duration::from_millis(200));
    }
}
