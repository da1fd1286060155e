pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{QueueError, QueueResult};

/// What a driver can do beyond plain push/pop. The manager feature-detects
/// delayed delivery through this at dispatch time.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverCapabilities {
    /// The driver persists delayed jobs itself.
    pub delayed: bool,
}

/// Storage backend for the queue. Implementations must be safe to share
/// between concurrent workers.
#[async_trait]
pub trait QueueDriver: Send + Sync + 'static {
    /// Append an envelope to the queue.
    async fn push(&self, payload: Vec<u8>) -> QueueResult<()>;

    /// Wait for the next envelope. Returns `Ok(None)` on a driver-side
    /// timeout with nothing ready, and `Err(QueueError::Cancelled)` when
    /// `token` fires.
    async fn pop(&self, token: &CancellationToken) -> QueueResult<Option<Vec<u8>>>;

    /// Make an envelope surface no earlier than `delay` from now.
    async fn push_delayed(&self, payload: Vec<u8>, delay: Duration) -> QueueResult<()> {
        let _ = (payload, delay);
        Err(QueueError::DelayedUnsupported)
    }

    fn capabilities(&self) -> DriverCapabilities {
        DriverCapabilities::default()
    }
}
