//! Job repository: the claim protocol and terminal writes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use forecast_core::{Job, JobId, JobStatus, ModelId};
use serde::Deserialize;

use crate::{DbError, get_db};

/// Repository for job persistence operations.
pub struct JobRepository;

/// Claim statements tried before a conflicting caller gives up.
const CLAIM_ATTEMPTS: u32 = 3;

/// Columns selected for a full job row.
const JOB_FIELDS: &str = r#"
    record::id(id) AS id,
    record::id(model) AS model_id,
    status,
    with_score,
    score,
    started_at,
    finished_at,
    error_reason
"#;

impl JobRepository {
    /// Put a new job in the queue for `model_id`.
    pub async fn enqueue(id: JobId, model_id: ModelId, with_score: bool) -> Result<Job, DbError> {
        let db = get_db()?;

        db.query(
            r#"
            CREATE type::thing("job", $id) SET
                model = type::thing("model", $model_id),
                status = "IN_QUEUE",
                with_score = $with_score
            "#,
        )
        .bind(("id", id.0))
        .bind(("model_id", model_id.0))
        .bind(("with_score", with_score))
        .await?
        .check()?;

        tracing::debug!(job_id = %id, model_id = %model_id, "job enqueued");

        Self::get(id).await
    }

    /// Get a job by ID.
    pub async fn get(id: JobId) -> Result<Job, DbError> {
        let db = get_db()?;

        let mut result = db
            .query(format!("SELECT {JOB_FIELDS} FROM type::thing(\"job\", $id)"))
            .bind(("id", id.0))
            .await?;

        let jobs: Vec<Job> = result.take(0)?;

        jobs.into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound(format!("Job not found: {}", id)))
    }

    /// Atomically move a job from IN_QUEUE to PROCESSING and stamp `started_at`.
    ///
    /// Returns `true` only for the single caller whose update matched the row.
    /// The statement commits on its own, so the claim is visible to every
    /// other worker before the caller starts computing. A write conflict with
    /// a concurrent transaction is retried; a caller that keeps conflicting
    /// has lost the race and gets `false`.
    pub async fn claim(id: JobId) -> Result<bool, DbError> {
        debug_assert!(JobStatus::InQueue.can_transition_to(JobStatus::Processing));

        for attempt in 1..=CLAIM_ATTEMPTS {
            match Self::try_claim(id).await {
                Err(DbError::Connection(e)) if is_write_conflict(&e) => {
                    tracing::debug!(job_id = %id, attempt, "claim conflicted, retrying");
                }
                result => return result,
            }
        }

        tracing::debug!(job_id = %id, "claim kept conflicting, treating as lost");
        Ok(false)
    }

    async fn try_claim(id: JobId) -> Result<bool, DbError> {
        let db = get_db()?;

        let mut result = db
            .query(
                r#"
                UPDATE type::thing("job", $id)
                SET status = "PROCESSING", started_at = time::now()
                WHERE status = "IN_QUEUE"
                RETURN status
                "#,
            )
            .bind(("id", id.0))
            .await?;

        let claimed: Vec<serde_json::Value> = result.take(0)?;

        Ok(claimed.len() == 1)
    }

    /// Write the terminal fields of a job unconditionally.
    pub async fn finalize(
        id: JobId,
        status: JobStatus,
        finished_at: DateTime<Utc>,
        error_reason: Option<&str>,
    ) -> Result<(), DbError> {
        if !JobStatus::Processing.can_transition_to(status) {
            return Err(DbError::InvalidStatus(format!(
                "cannot finalize job {} as {}",
                id, status
            )));
        }

        let db = get_db()?;

        let mut result = db
            .query(
                r#"
                UPDATE type::thing("job", $id)
                SET status = $status,
                    finished_at = <datetime> $finished_at,
                    error_reason = $error_reason
                RETURN status
                "#,
            )
            .bind(("id", id.0))
            .bind(("status", status))
            .bind(("finished_at", finished_at.to_rfc3339()))
            .bind(("error_reason", error_reason.map(str::to_string)))
            .await?;

        let updated: Vec<serde_json::Value> = result.take(0)?;

        if updated.is_empty() {
            return Err(DbError::NotFound(format!("Job not found: {}", id)));
        }

        Ok(())
    }

    /// Store the accuracy score of a job.
    pub async fn update_score(id: JobId, score: f64) -> Result<(), DbError> {
        if !score.is_finite() {
            return Err(DbError::Serialization(format!(
                "score for job {} is not finite: {}",
                id, score
            )));
        }

        let db = get_db()?;

        let mut result = db
            .query(r#"UPDATE type::thing("job", $id) SET score = $score RETURN status"#)
            .bind(("id", id.0))
            .bind(("score", score))
            .await?;

        let updated: Vec<serde_json::Value> = result.take(0)?;

        if updated.is_empty() {
            return Err(DbError::NotFound(format!("Job not found: {}", id)));
        }

        Ok(())
    }

    /// Return PROCESSING jobs claimed before `cutoff` to the queue.
    pub async fn reclaim_stale(cutoff: DateTime<Utc>) -> Result<u64, DbError> {
        let db = get_db()?;

        let mut result = db
            .query(
                r#"
                UPDATE job
                SET status = "IN_QUEUE", started_at = NONE
                WHERE status = "PROCESSING" AND started_at < <datetime> $cutoff
                RETURN status
                "#,
            )
            .bind(("cutoff", cutoff.to_rfc3339()))
            .await?;

        let reclaimed: Vec<serde_json::Value> = result.take(0)?;

        Ok(reclaimed.len() as u64)
    }

    /// Count jobs by status.
    pub async fn count_by_status() -> Result<HashMap<JobStatus, u64>, DbError> {
        let db = get_db()?;

        let mut result = db
            .query("SELECT status, count() AS count FROM job GROUP BY status")
            .await?;

        #[derive(Deserialize)]
        struct StatusCount {
            status: JobStatus,
            count: i64,
        }

        let counts: Vec<StatusCount> = result.take(0)?;

        Ok(counts
            .into_iter()
            .map(|c| (c.status, c.count as u64))
            .collect())
    }
}

/// Optimistic transactions that touched the same record report this retryable error.
fn is_write_conflict(err: &surrealdb::Error) -> bool {
    let message = err.to_string();
    message.contains("read or write conflict") || message.contains("can be retried")
}
