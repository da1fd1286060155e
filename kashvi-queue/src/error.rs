use thiserror::Error;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Infrastructure errors for queue operations.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("serialize job {job_type}: {source}")]
    Serialize {
        job_type: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("queue driver: {0}")]
    Driver(String),

    #[error("queue operation cancelled")]
    Cancelled,

    #[error("driver has no delayed delivery support")]
    DelayedUnsupported,

    #[cfg(feature = "postgres")]
    #[error("dead-letter store: {0}")]
    Store(#[from] sqlx::Error),
}
