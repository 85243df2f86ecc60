#![allow(dead_code, clippy::disallowed_methods)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use actors::{ComputeError, ComputeFuture, FnBackend, ForecastBackend, QueueStore, StoreFuture};
use chrono::{DateTime, Days, NaiveDate, Utc};
use db::DbError;
use forecast_core::{
    CountryId, DisplayType, ForecastJob, ForecastOutput, ForecastType, JobId, JobStatus, ModelId,
    ModelParams, PredictionPoint,
};

/// Row kept by the in-memory store for each job.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub job: ForecastJob,
    pub status: JobStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_reason: Option<String>,
    pub score: Option<f64>,
    pub finalize_calls: u32,
}

#[derive(Default)]
struct Inner {
    jobs: BTreeMap<JobId, JobRow>,
    predictions: HashMap<ModelId, Vec<PredictionPoint>>,
    unreachable: bool,
    fail_predictions: bool,
}

/// In-memory `QueueStore` with the same claim semantics as the database.
#[derive(Default)]
pub struct MemoryQueueStore {
    inner: Mutex<Inner>,
}

fn unreachable_error() -> DbError {
    DbError::Query("connection refused".to_string())
}

impl MemoryQueueStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("store mutex poisoned")
    }

    pub fn add(&self, job: ForecastJob) {
        self.lock().jobs.insert(
            job.id,
            JobRow {
                job,
                status: JobStatus::InQueue,
                started_at: None,
                finished_at: None,
                error_reason: None,
                score: None,
                finalize_calls: 0,
            },
        );
    }

    /// Simulate a claim made by another process at `since`.
    pub fn mark_processing(&self, id: JobId, since: DateTime<Utc>) {
        if let Some(row) = self.lock().jobs.get_mut(&id) {
            row.status = JobStatus::Processing;
            row.started_at = Some(since);
        }
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    pub fn set_fail_predictions(&self, fail: bool) {
        self.lock().fail_predictions = fail;
    }

    pub fn row(&self, id: JobId) -> JobRow {
        self.lock().jobs.get(&id).cloned().expect("job exists")
    }

    pub fn status(&self, id: JobId) -> JobStatus {
        self.row(id).status
    }

    pub fn predictions(&self, model_id: ModelId) -> Vec<PredictionPoint> {
        self.lock()
            .predictions
            .get(&model_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl QueueStore for MemoryQueueStore {
    fn load_pending(&self) -> StoreFuture<'_, Vec<ForecastJob>> {
        let result = {
            let inner = self.lock();
            if inner.unreachable {
                Err(unreachable_error())
            } else {
                Ok(inner
                    .jobs
                    .values()
                    .filter(|row| row.status == JobStatus::InQueue)
                    .map(|row| row.job.clone())
                    .collect())
            }
        };
        Box::pin(async move { result })
    }

    fn claim(&self, id: JobId) -> StoreFuture<'_, bool> {
        let result = {
            let mut inner = self.lock();
            if inner.unreachable {
                Err(unreachable_error())
            } else {
                match inner.jobs.get_mut(&id) {
                    Some(row) if row.status == JobStatus::InQueue => {
                        row.status = JobStatus::Processing;
                        row.started_at = Some(Utc::now());
                        Ok(true)
                    }
                    _ => Ok(false),
                }
            }
        };
        Box::pin(async move { result })
    }

    fn finalize(
        &self,
        id: JobId,
        status: JobStatus,
        finished_at: DateTime<Utc>,
        error_reason: Option<String>,
    ) -> StoreFuture<'_, ()> {
        let result = {
            let mut inner = self.lock();
            if inner.unreachable {
                Err(unreachable_error())
            } else if !status.is_terminal() {
                Err(DbError::InvalidStatus(status.to_string()))
            } else {
                match inner.jobs.get_mut(&id) {
                    Some(row) => {
                        row.status = status;
                        row.finished_at = Some(finished_at);
                        row.error_reason = error_reason;
                        row.finalize_calls += 1;
                        Ok(())
                    }
                    None => Err(DbError::NotFound(id.to_string())),
                }
            }
        };
        Box::pin(async move { result })
    }

    fn replace_predictions(
        &self,
        model_id: ModelId,
        points: Vec<PredictionPoint>,
    ) -> StoreFuture<'_, u64> {
        let result = {
            let mut inner = self.lock();
            if inner.unreachable || inner.fail_predictions {
                Err(unreachable_error())
            } else {
                let count = points.len() as u64;
                inner.predictions.insert(model_id, points);
                Ok(count)
            }
        };
        Box::pin(async move { result })
    }

    fn update_score(&self, id: JobId, score: f64) -> StoreFuture<'_, ()> {
        let result = {
            let mut inner = self.lock();
            match inner.jobs.get_mut(&id) {
                Some(row) => {
                    row.score = Some(score);
                    Ok(())
                }
                None => Err(DbError::NotFound(id.to_string())),
            }
        };
        Box::pin(async move { result })
    }

    fn reclaim_stale(&self, cutoff: DateTime<Utc>) -> StoreFuture<'_, u64> {
        let count = {
            let mut inner = self.lock();
            let mut count = 0;
            for row in inner.jobs.values_mut() {
                if row.status == JobStatus::Processing
                    && row.started_at.is_some_and(|started| started < cutoff)
                {
                    row.status = JobStatus::InQueue;
                    row.started_at = None;
                    count += 1;
                }
            }
            count
        };
        Box::pin(async move { Ok(count) })
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn forecast_job(id: i64, model_id: i64, with_score: bool) -> ForecastJob {
    ForecastJob {
        id: JobId(id),
        model_id: ModelId(model_id),
        country_id: CountryId(1),
        country_iso_code: "DE".to_string(),
        forecast_type: ForecastType::Cases,
        display_type: DisplayType::Cumulative,
        params: ModelParams::default(),
        change_points: Vec::new(),
        with_score,
    }
}

/// `n` daily points starting 2020-03-01.
pub fn points(n: u64) -> Vec<PredictionPoint> {
    (0..n)
        .map(|i| {
            let day = date(2020, 3, 1) + Days::new(i);
            let v = i as f64;
            PredictionPoint::new(day, v, v - 1.0, v + 1.0)
        })
        .collect()
}

/// Backend that counts its invocations.
pub struct CountingBackend<F> {
    pub calls: Arc<AtomicUsize>,
    inner: F,
}

impl<F> CountingBackend<F>
where
    F: Fn(&ForecastJob) -> Result<ForecastOutput, ComputeError> + Send + Sync + 'static,
{
    pub fn new(inner: F) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            inner,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<F> ForecastBackend for CountingBackend<F>
where
    F: Fn(&ForecastJob) -> Result<ForecastOutput, ComputeError> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        "counting"
    }

    fn compute(&self, job: &ForecastJob) -> ComputeFuture {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = (self.inner)(job);
        Box::pin(async move {
            tokio::task::yield_now().await;
            result
        })
    }
}

/// Backend returning `n` points for every job.
pub fn fixed_backend(
    n: u64,
) -> FnBackend<impl Fn(&ForecastJob) -> ComputeFuture + Send + Sync + 'static> {
    FnBackend::new("fixed", move |_job: &ForecastJob| {
        Box::pin(async move { Ok::<_, ComputeError>(ForecastOutput::new(points(n))) }) as ComputeFuture
    })
}
