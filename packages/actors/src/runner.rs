//! Job runner: claim, compute, persist and finalize one job at a time.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use db::DbError;
use forecast_core::{ForecastJob, JobStatus, ScanEvent, ScanId, ScanSummary};
use futures_util::FutureExt;
use tokio::sync::broadcast;

use crate::backend::{ComputeError, ForecastBackend};
use crate::store::QueueStore;

/// What happened to one loaded job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// Another worker claimed the job first; nothing was written.
    Skipped,
    /// Predictions stored, job DONE.
    Done {
        predictions: u64,
        score: Option<f64>,
    },
    /// Job FAILED with the given reason.
    Failed { reason: String },
}

/// Runs the claim protocol and compute step for queued jobs.
///
/// Compute faults are recorded on the job. Store errors from claim, finalize
/// and load are returned to the caller and abort the scan.
#[derive(Clone)]
pub struct JobRunner {
    store: Arc<dyn QueueStore>,
    backend: Arc<dyn ForecastBackend>,
    event_tx: Option<broadcast::Sender<ScanEvent>>,
}

impl JobRunner {
    pub fn new(store: Arc<dyn QueueStore>, backend: Arc<dyn ForecastBackend>) -> Self {
        Self {
            store,
            backend,
            event_tx: None,
        }
    }

    /// Set the event broadcaster.
    pub fn with_event_tx(mut self, tx: broadcast::Sender<ScanEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    fn broadcast(&self, event: ScanEvent) {
        if let Some(ref tx) = self.event_tx {
            let _ = tx.send(event);
        }
    }

    /// Load the pending batch and run every job in order.
    pub async fn scan(&self, scan_id: ScanId) -> Result<ScanSummary, DbError> {
        match self.scan_batch(scan_id).await {
            Ok(summary) => {
                tracing::info!(
                    %scan_id,
                    loaded = summary.loaded,
                    skipped = summary.skipped,
                    done = summary.done,
                    failed = summary.failed,
                    "scan completed"
                );
                self.broadcast(ScanEvent::ScanCompleted {
                    scan_id,
                    summary,
                    timestamp: Utc::now(),
                });
                Ok(summary)
            }
            Err(e) => {
                tracing::error!(%scan_id, error = %e, "scan aborted");
                self.broadcast(ScanEvent::ScanAborted {
                    scan_id,
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }

    async fn scan_batch(&self, scan_id: ScanId) -> Result<ScanSummary, DbError> {
        let jobs = self.store.load_pending().await?;

        let mut summary = ScanSummary {
            loaded: jobs.len() as u64,
            ..ScanSummary::default()
        };

        if !jobs.is_empty() {
            tracing::debug!(%scan_id, pending = jobs.len(), "scan started");
        }
        self.broadcast(ScanEvent::ScanStarted {
            scan_id,
            pending: summary.loaded,
            timestamp: Utc::now(),
        });

        for job in &jobs {
            match self.run_job(scan_id, job).await? {
                JobOutcome::Skipped => summary.skipped += 1,
                JobOutcome::Done { .. } => summary.done += 1,
                JobOutcome::Failed { .. } => summary.failed += 1,
            }
        }

        Ok(summary)
    }

    /// Claim `job`, compute it and write its terminal state.
    ///
    /// Finalize runs exactly once for every job this call claims.
    pub async fn run_job(&self, scan_id: ScanId, job: &ForecastJob) -> Result<JobOutcome, DbError> {
        if !self.store.claim(job.id).await? {
            tracing::debug!(job_id = %job.id, "job already claimed, skipping");
            self.broadcast(ScanEvent::JobSkipped {
                scan_id,
                job_id: job.id,
                timestamp: Utc::now(),
            });
            return Ok(JobOutcome::Skipped);
        }

        tracing::info!(
            job_id = %job.id,
            model_id = %job.model_id,
            backend = self.backend.name(),
            "job claimed"
        );
        self.broadcast(ScanEvent::JobClaimed {
            scan_id,
            job_id: job.id,
            model_id: job.model_id,
            timestamp: Utc::now(),
        });

        let started = Instant::now();
        let outcome = match self.execute(job).await {
            Ok((predictions, score)) => JobOutcome::Done { predictions, score },
            Err(reason) => JobOutcome::Failed { reason },
        };

        let (status, error_reason) = match &outcome {
            JobOutcome::Failed { reason } => (JobStatus::Failed, Some(reason.clone())),
            _ => (JobStatus::Done, None),
        };
        self.store
            .finalize(job.id, status, Utc::now(), error_reason)
            .await?;

        let duration_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            JobOutcome::Done { predictions, score } => {
                tracing::info!(
                    job_id = %job.id,
                    predictions,
                    score = ?score,
                    duration_ms,
                    "job done"
                );
                self.broadcast(ScanEvent::JobCompleted {
                    scan_id,
                    job_id: job.id,
                    predictions: *predictions,
                    duration_ms,
                    timestamp: Utc::now(),
                });
            }
            JobOutcome::Failed { reason } => {
                tracing::warn!(job_id = %job.id, reason = %reason, duration_ms, "job failed");
                self.broadcast(ScanEvent::JobFailed {
                    scan_id,
                    job_id: job.id,
                    error: reason.clone(),
                    timestamp: Utc::now(),
                });
            }
            JobOutcome::Skipped => {}
        }

        Ok(outcome)
    }

    /// Compute and persist. Every fault comes back as the reason string.
    async fn execute(&self, job: &ForecastJob) -> Result<(u64, Option<f64>), String> {
        let output = AssertUnwindSafe(async { self.backend.compute(job).await })
            .catch_unwind()
            .await
            .map_err(|payload| ComputeError::panicked(payload).to_string())?
            .map_err(|e| e.to_string())?;

        let score = output.score;
        let stored = self
            .store
            .replace_predictions(job.model_id, output.into_points())
            .await
            .map_err(|e| format!("failed to store predictions: {e}"))?;

        let mut written_score = None;
        if job.with_score
            && let Some(score) = score
        {
            self.store
                .update_score(job.id, score)
                .await
                .map_err(|e| format!("failed to store score: {e}"))?;
            written_score = Some(score);
        }

        Ok((stored, written_score))
    }

    /// Put jobs stuck in PROCESSING for longer than `stale_after` back in the queue.
    pub async fn reclaim_stale(&self, scan_id: ScanId, stale_after: Duration) -> Result<u64, DbError> {
        let Some(cutoff) = chrono::Duration::from_std(stale_after)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            tracing::warn!(?stale_after, "stale job timeout out of range, not reclaiming");
            return Ok(0);
        };

        let count = self.store.reclaim_stale(cutoff).await?;
        if count > 0 {
            tracing::warn!(%scan_id, count, %cutoff, "reclaimed stale jobs");
            self.broadcast(ScanEvent::JobsReclaimed {
                scan_id,
                count,
                timestamp: Utc::now(),
            });
        }

        Ok(count)
    }
}
