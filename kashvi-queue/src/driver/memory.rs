use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use super::QueueDriver;
use crate::{QueueError, QueueResult};

const BUFFER: usize = 1000;

/// In-process, channel-backed driver. Suits development and tests; nothing
/// survives a restart, and delayed jobs fall back to an in-process timer in
/// the manager.
#[derive(Clone)]
pub struct MemoryDriver {
    tx: mpsc::Sender<Vec<u8>>,
    rx: Arc<Mutex<mpsc::Receiver<Vec<u8>>>>,
}

impl MemoryDriver {
    /// A driver with room for 1000 queued envelopes.
    pub fn new() -> Self {
        Self::with_capacity(BUFFER)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }
}

impl Default for MemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueDriver for MemoryDriver {
    async fn push(&self, payload: Vec<u8>) -> QueueResult<()> {
        self.tx
            .send(payload)
            .await
            .map_err(|_| QueueError::Driver("memory queue closed".to_string()))
    }

    async fn pop(&self, token: &CancellationToken) -> QueueResult<Option<Vec<u8>>> {
        let mut rx = tokio::select! {
            _ = token.cancelled() => return Err(QueueError::Cancelled),
            rx = self.rx.lock() => rx,
        };
        tokio::select! {
            _ = token.cancelled() => Err(QueueError::Cancelled),
            payload = rx.recv() => Ok(payload),
        }
    }
}
