use std::collections::HashMap;

use parking_lot::Mutex;

/// Fire and overlap-skip counters, keyed by entry id.
#[derive(Default)]
pub struct ScheduleMetrics {
    fires: Mutex<HashMap<String, u64>>,
    overlap_skips: Mutex<HashMap<String, u64>>,
}

impl ScheduleMetrics {
    pub(crate) fn record_fire(&self, id: &str) {
        *self.fires.lock().entry(id.to_string()).or_default() += 1;
    }

    pub(crate) fn record_skip(&self, id: &str) {
        *self.overlap_skips.lock().entry(id.to_string()).or_default() += 1;
    }

    /// How many times the entry was dispatched.
    pub fn fires(&self, id: &str) -> u64 {
        self.fires.lock().get(id).copied().unwrap_or(0)
    }

    /// How many dispatches were skipped because the previous run was still
    /// executing.
    pub fn overlap_skips(&self, id: &str) -> u64 {
        self.overlap_skips.lock().get(id).copied().unwrap_or(0)
    }
}
