//! Queue store trait: every read and write the runner performs.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use db::DbError;
use db::repositories::{JobRepository, PendingJobRepository, PredictionRepository};
use forecast_core::{ForecastJob, JobId, JobStatus, ModelId, PredictionPoint};

/// Future type for store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DbError>> + Send + 'a>>;

/// Persistence seen by the runner.
pub trait QueueStore: Send + Sync + 'static {
    /// Every IN_QUEUE job, assembled for compute.
    fn load_pending(&self) -> StoreFuture<'_, Vec<ForecastJob>>;

    /// Move `id` from IN_QUEUE to PROCESSING. `true` only for the winner.
    fn claim(&self, id: JobId) -> StoreFuture<'_, bool>;

    fn finalize(
        &self,
        id: JobId,
        status: JobStatus,
        finished_at: DateTime<Utc>,
        error_reason: Option<String>,
    ) -> StoreFuture<'_, ()>;

    /// Replace the model's prediction set, returning the stored count.
    fn replace_predictions(
        &self,
        model_id: ModelId,
        points: Vec<PredictionPoint>,
    ) -> StoreFuture<'_, u64>;

    fn update_score(&self, id: JobId, score: f64) -> StoreFuture<'_, ()>;

    /// Return PROCESSING jobs claimed before `cutoff` to the queue.
    fn reclaim_stale(&self, _cutoff: DateTime<Utc>) -> StoreFuture<'_, u64> {
        Box::pin(async { Ok(0) })
    }
}

/// Store backed by the SurrealDB repositories.
#[derive(Debug, Clone, Copy, Default)]
pub struct DbQueueStore;

impl QueueStore for DbQueueStore {
    fn load_pending(&self) -> StoreFuture<'_, Vec<ForecastJob>> {
        Box::pin(PendingJobRepository::load_pending())
    }

    fn claim(&self, id: JobId) -> StoreFuture<'_, bool> {
        Box::pin(JobRepository::claim(id))
    }

    fn finalize(
        &self,
        id: JobId,
        status: JobStatus,
        finished_at: DateTime<Utc>,
        error_reason: Option<String>,
    ) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            JobRepository::finalize(id, status, finished_at, error_reason.as_deref()).await
        })
    }

    fn replace_predictions(
        &self,
        model_id: ModelId,
        points: Vec<PredictionPoint>,
    ) -> StoreFuture<'_, u64> {
        Box::pin(async move { PredictionRepository::replace_for_model(model_id, &points).await })
    }

    fn update_score(&self, id: JobId, score: f64) -> StoreFuture<'_, ()> {
        Box::pin(JobRepository::update_score(id, score))
    }

    fn reclaim_stale(&self, cutoff: DateTime<Utc>) -> StoreFuture<'_, u64> {
        Box::pin(JobRepository::reclaim_stale(cutoff))
    }
}
