use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{DriverCapabilities, QueueDriver};
use crate::{QueueError, QueueResult};

const QUEUE_KEY: &str = "kashvi:queue:jobs";
const DELAYED_KEY: &str = "kashvi:queue:delayed";
const POP_TIMEOUT_SECS: f64 = 5.0;

/// Redis-backed queue driver.
///
/// Immediate jobs live in a list (`LPUSH`/`BRPOP`); delayed jobs sit in a
/// sorted set scored by the Unix second at which they become ready, and a
/// background promoter moves due members into the list once per second.
pub struct RedisDriver {
    conn: ConnectionManager,
}

impl RedisDriver {
    /// Connect to `url` and start the delayed-job promoter. The promoter
    /// exits when `token` fires.
    pub async fn connect(url: &str, token: CancellationToken) -> QueueResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| QueueError::Driver(format!("redis client: {e}")))?;
        Self::new(client, token).await
    }

    /// Build a driver from an existing client, sharing it with whatever else
    /// the application uses Redis for.
    pub async fn new(client: redis::Client, token: CancellationToken) -> QueueResult<Self> {
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| QueueError::Driver(format!("redis connect: {e}")))?;
        info!("queue: connected to redis");

        let driver = Self { conn };
        tokio::spawn(promote_delayed(driver.conn.clone(), token));
        Ok(driver)
    }
}

#[async_trait]
impl QueueDriver for RedisDriver {
    async fn push(&self, payload: Vec<u8>) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(QUEUE_KEY, payload)
            .await
            .map_err(|e| QueueError::Driver(format!("redis push: {e}")))
    }

    async fn pop(&self, token: &CancellationToken) -> QueueResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let pop = async move {
            conn.brpop::<_, Option<(String, Vec<u8>)>>(QUEUE_KEY, POP_TIMEOUT_SECS)
                .await
        };

        tokio::select! {
            _ = token.cancelled() => Err(QueueError::Cancelled),
            result = pop => match result {
                Ok(Some((_key, payload))) => Ok(Some(payload)),
                Ok(None) => Ok(None),
                Err(e) => Err(QueueError::Driver(format!("redis pop: {e}"))),
            },
        }
    }

    async fn push_delayed(&self, payload: Vec<u8>, delay: Duration) -> QueueResult<()> {
        let ready_at = Utc::now().timestamp() + delay.as_secs() as i64;
        let mut conn = self.conn.clone();
        conn.zadd::<_, _, _, ()>(DELAYED_KEY, payload, ready_at)
            .await
            .map_err(|e| QueueError::Driver(format!("redis push delayed: {e}")))
    }

    fn capabilities(&self) -> DriverCapabilities {
        DriverCapabilities { delayed: true }
    }
}

/// Moves jobs whose ready time has passed from the delayed set into the main
/// list. Removal and push happen in one atomic pipeline so a crash leaves
/// each member in exactly one of the two structures.
async fn promote_delayed(mut conn: ConnectionManager, token: CancellationToken) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut failing = false;

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("queue: delayed-job promoter stopped");
                return;
            }
            _ = ticker.tick() => {}
        }

        let now = Utc::now().timestamp();
        let due: Vec<Vec<u8>> = match conn.zrangebyscore(DELAYED_KEY, "-inf", now).await {
            Ok(due) => due,
            Err(e) => {
                // One line per failure streak, not per second.
                if !failing {
                    warn!(error = %e, "queue: delayed-job scan failed");
                    failing = true;
                }
                continue;
            }
        };
        failing = false;
        if due.is_empty() {
            continue;
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for payload in &due {
            pipe.zrem(DELAYED_KEY, payload.as_slice()).ignore();
            pipe.lpush(QUEUE_KEY, payload.as_slice()).ignore();
        }
        if let Err(e) = pipe.query_async::<_, ()>(&mut conn).await {
            warn!(error = %e, "queue: delayed-job promotion failed");
        }
    }
}
