use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::credential::EncryptedCredential;
use crate::models::job::{Job, JobErrorCode, JobStatus};

/// Narrow persistence contract the worker core depends on.
///
/// Injected as a trait so the worker is testable against an in-memory fake;
/// the production implementation is [`PgJobStore`].
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Atomically claim a job for processing.
    ///
    /// Succeeds only when the job is `queued`, or `processing` with a lock
    /// older than `stale_threshold`. The claim sets the lock markers,
    /// transitions the status, and increments the attempt counter in one
    /// conditional write. Returns `None` when another worker holds a live
    /// claim (or the job does not exist); the caller treats that as a
    /// benign no-op, not an error.
    async fn claim_job(
        &self,
        job_id: Uuid,
        worker_id: &str,
        stale_threshold: Duration,
    ) -> Result<Option<Job>, StoreError>;

    /// Fetch a user's encrypted provider credential.
    async fn get_credential(
        &self,
        user_id: Uuid,
    ) -> Result<Option<EncryptedCredential>, StoreError>;

    /// Transition a job and release its claim in one write.
    async fn update_job_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error_code: Option<JobErrorCode>,
        attempt_count: i32,
    ) -> Result<(), StoreError>;

    /// Next job eligible for processing: queued past its retry backoff, or
    /// processing with a stale lock. Scheduler affordance for the poll
    /// loop; the worker core itself never calls this.
    async fn next_due_job(
        &self,
        retry_backoff: Duration,
        stale_threshold: Duration,
    ) -> Result<Option<Uuid>, StoreError>;
}

/// PostgreSQL-backed job store.
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn claim_job(
        &self,
        job_id: Uuid,
        worker_id: &str,
        stale_threshold: Duration,
    ) -> Result<Option<Job>, StoreError> {
        let stale_before = Utc::now() - stale_threshold;

        let row = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'processing',
                locked_at = NOW(),
                locked_by = $2,
                attempt_count = attempt_count + 1,
                updated_at = NOW()
            WHERE id = $1
              AND (status = 'queued'
                   OR (status = 'processing' AND locked_at < $3))
            RETURNING id, user_id, phrases, status, error_code, attempt_count,
                      locked_at, locked_by, created_at, updated_at
            "#,
        )
        .bind(job_id)
        .bind(worker_id)
        .bind(stale_before)
        .fetch_optional(&self.pool)
        .await?;

        row.map(job_from_row).transpose()
    }

    async fn get_credential(
        &self,
        user_id: Uuid,
    ) -> Result<Option<EncryptedCredential>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT user_id, ciphertext, iv, auth_tag
            FROM credentials
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(r) => Some(EncryptedCredential {
                user_id: r.try_get("user_id")?,
                ciphertext: r.try_get("ciphertext")?,
                iv: r.try_get("iv")?,
                auth_tag: r.try_get("auth_tag")?,
            }),
            None => None,
        })
    }

    async fn update_job_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error_code: Option<JobErrorCode>,
        attempt_count: i32,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = $2,
                error_code = $3,
                attempt_count = $4,
                locked_at = NULL,
                locked_by = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(status.to_string())
        .bind(error_code.map(|c| c.to_string()))
        .bind(attempt_count)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn next_due_job(
        &self,
        retry_backoff: Duration,
        stale_threshold: Duration,
    ) -> Result<Option<Uuid>, StoreError> {
        let now = Utc::now();
        let backoff_before = now - retry_backoff;
        let stale_before = now - stale_threshold;

        let row = sqlx::query(
            r#"
            SELECT id
            FROM jobs
            WHERE (status = 'queued'
                   AND (attempt_count = 0 OR updated_at < $1))
               OR (status = 'processing' AND locked_at < $2)
            ORDER BY updated_at ASC
            LIMIT 1
            "#,
        )
        .bind(backoff_before)
        .bind(stale_before)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(r) => Some(r.try_get("id")?),
            None => None,
        })
    }
}

fn job_from_row(row: sqlx::postgres::PgRow) -> Result<Job, StoreError> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<JobStatus>()
        .map_err(|_| StoreError::Malformed(format!("unknown job status '{status}'")))?;

    let error_code: Option<String> = row.try_get("error_code")?;
    let error_code = error_code
        .map(|c| {
            c.parse::<JobErrorCode>()
                .map_err(|_| StoreError::Malformed(format!("unknown error code '{c}'")))
        })
        .transpose()?;

    let phrases: serde_json::Value = row.try_get("phrases")?;
    let phrases = serde_json::from_value(phrases)
        .map_err(|e| StoreError::Malformed(format!("invalid phrase payload: {e}")))?;

    Ok(Job {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        phrases,
        status,
        error_code,
        attempt_count: row.try_get("attempt_count")?,
        locked_at: row.try_get("locked_at")?,
        locked_by: row.try_get("locked_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("malformed row: {0}")]
    Malformed(String),
}
