use chrono::{DateTime, Utc};
use serde::Serialize;

/// A terminally failed job, captured for out-of-band inspection and
/// reprocessing.
#[derive(Debug, Clone, Serialize)]
pub struct FailedJob {
    pub job_type: String,
    /// The envelope payload as UTF-8 JSON.
    pub payload: String,
    /// Error text from the final attempt.
    pub error: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

#[cfg(feature = "postgres")]
pub(crate) mod store {
    use sqlx::PgPool;

    use super::FailedJob;

    /// Creates the dead-letter table and its index when missing.
    pub(crate) async fn migrate(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS kashvi_failed_jobs (
                 id BIGSERIAL PRIMARY KEY,
                 job_type VARCHAR(255) NOT NULL,
                 payload TEXT NOT NULL,
                 error TEXT,
                 attempts INT NOT NULL DEFAULT 0,
                 failed_at TIMESTAMPTZ NOT NULL DEFAULT now()
             )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS kashvi_failed_jobs_job_type_idx
                 ON kashvi_failed_jobs (job_type)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    pub(crate) async fn insert(pool: &PgPool, record: &FailedJob) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO kashvi_failed_jobs (job_type, payload, error, attempts, failed_at)
                 VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&record.job_type)
        .bind(&record.payload)
        .bind(&record.error)
        .bind(record.attempts as i32)
        .bind(record.failed_at)
        .execute(pool)
        .await?;

        Ok(())
    }
}
