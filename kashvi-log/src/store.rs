use async_trait::async_trait;

use crate::record::LogRecord;

/// Destination for batched log records.
///
/// The sink ignores insert errors: durability of any single record is not
/// guaranteed, and sustained unavailability surfaces as dropped records in
/// the sink's counters rather than as blocked emitters.
#[async_trait]
pub trait LogStore: Send + Sync + 'static {
    async fn insert_batch(&self, batch: &[LogRecord]) -> anyhow::Result<()>;
}
