#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use actors::{ComputeError, ForecastOutput, JobOutcome, JobRunner, forecast_backend};
use common::{CountingBackend, MemoryQueueStore, date, fixed_backend, forecast_job, points};
use db::DbError;
use forecast_core::{JobId, JobStatus, ModelId, ScanEvent, ScanId};
use tokio::sync::broadcast;

#[tokio::test]
async fn test_completed_job_stores_predictions_without_score() -> Result<(), Box<dyn Error>> {
    let store = MemoryQueueStore::new();
    store.add(forecast_job(1, 10, false));

    let backend = CountingBackend::new(|_| Ok(ForecastOutput::new(points(10)).with_score(0.3)));
    let calls = backend.calls.clone();
    let runner = JobRunner::new(store.clone(), Arc::new(backend));

    let summary = runner.scan(ScanId::new()).await?;
    assert_eq!(summary.loaded, 1);
    assert_eq!(summary.done, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let row = store.row(JobId(1));
    assert_eq!(row.status, JobStatus::Done);
    assert!(row.error_reason.is_none());
    assert!(row.started_at.is_some());
    assert!(row.finished_at.is_some());
    // Not requested, so not written.
    assert!(row.score.is_none());
    assert_eq!(row.finalize_calls, 1);
    assert_eq!(store.predictions(ModelId(10)).len(), 10);

    Ok(())
}

#[tokio::test]
async fn test_requested_score_is_written() -> Result<(), Box<dyn Error>> {
    let store = MemoryQueueStore::new();
    store.add(forecast_job(1, 10, true));

    let backend = forecast_backend!("scored", |job| {
        assert!(job.with_score);
        Ok(ForecastOutput::new(points(3)).with_score(0.25))
    });
    let runner = JobRunner::new(store.clone(), Arc::new(backend));

    let outcome = runner.run_job(ScanId::new(), &forecast_job(1, 10, true)).await?;
    assert_eq!(
        outcome,
        JobOutcome::Done {
            predictions: 3,
            score: Some(0.25)
        }
    );
    assert_eq!(store.row(JobId(1)).score, Some(0.25));

    Ok(())
}

#[tokio::test]
async fn test_change_points_are_flagged_on_stored_predictions() -> Result<(), Box<dyn Error>> {
    let store = MemoryQueueStore::new();
    store.add(forecast_job(1, 10, false));

    let backend = forecast_backend!("flagged", |_job| {
        Ok(ForecastOutput::new(points(5)).with_change_points([date(2020, 3, 3)]))
    });
    let runner = JobRunner::new(store.clone(), Arc::new(backend));
    runner.scan(ScanId::new()).await?;

    let stored = store.predictions(ModelId(10));
    let flagged: Vec<_> = stored
        .iter()
        .filter(|p| p.is_change_point)
        .map(|p| p.date)
        .collect();
    assert_eq!(flagged, vec![date(2020, 3, 3)]);

    Ok(())
}

#[tokio::test]
async fn test_racing_runners_compute_once() -> Result<(), Box<dyn Error>> {
    let store = MemoryQueueStore::new();
    store.add(forecast_job(2, 20, false));

    let backend = Arc::new(CountingBackend::new(|_| {
        Ok(ForecastOutput::new(points(4)))
    }));
    let first = JobRunner::new(store.clone(), backend.clone());
    let second = JobRunner::new(store.clone(), backend.clone());

    let job = forecast_job(2, 20, false);
    let (a, b) = tokio::join!(
        first.run_job(ScanId::new(), &job),
        second.run_job(ScanId::new(), &job)
    );
    let outcomes = [a?, b?];

    let skipped = outcomes
        .iter()
        .filter(|o| **o == JobOutcome::Skipped)
        .count();
    assert_eq!(skipped, 1);
    assert_eq!(backend.calls(), 1);

    let row = store.row(JobId(2));
    assert_eq!(row.status, JobStatus::Done);
    assert_eq!(row.finalize_calls, 1);

    Ok(())
}

#[tokio::test]
async fn test_failure_is_recorded_and_scan_continues() -> Result<(), Box<dyn Error>> {
    let store = MemoryQueueStore::new();
    store.add(forecast_job(1, 10, false));
    store.add(forecast_job(3, 30, false));
    store.add(forecast_job(4, 40, false));

    let backend = CountingBackend::new(|job| {
        if job.id == JobId(3) {
            Err(ComputeError::InsufficientData)
        } else {
            Ok(ForecastOutput::new(points(2)))
        }
    });
    let runner = JobRunner::new(store.clone(), Arc::new(backend));

    let summary = runner.scan(ScanId::new()).await?;
    assert_eq!(summary.done, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.processed(), 3);

    let failed = store.row(JobId(3));
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error_reason.as_deref(), Some("insufficient data"));
    assert!(failed.finished_at.is_some());
    assert!(store.predictions(ModelId(30)).is_empty());

    assert_eq!(store.status(JobId(4)), JobStatus::Done);

    Ok(())
}

#[tokio::test]
async fn test_unreachable_store_aborts_without_failing_jobs() -> Result<(), Box<dyn Error>> {
    let store = MemoryQueueStore::new();
    store.add(forecast_job(5, 50, false));

    let backend = Arc::new(CountingBackend::new(|_| Ok(ForecastOutput::new(points(1)))));
    let runner = JobRunner::new(store.clone(), backend.clone());

    store.set_unreachable(true);
    let result = runner.run_job(ScanId::new(), &forecast_job(5, 50, false)).await;
    assert!(matches!(result, Err(DbError::Query(_))));

    let scan = runner.scan(ScanId::new()).await;
    assert!(scan.is_err());

    store.set_unreachable(false);
    let row = store.row(JobId(5));
    assert_eq!(row.status, JobStatus::InQueue);
    assert!(row.error_reason.is_none());
    assert_eq!(row.finalize_calls, 0);
    assert_eq!(backend.calls(), 0);

    Ok(())
}

#[tokio::test]
async fn test_backend_panic_marks_job_failed() -> Result<(), Box<dyn Error>> {
    let store = MemoryQueueStore::new();
    store.add(forecast_job(6, 60, false));
    store.add(forecast_job(7, 70, false));

    let backend = forecast_backend!("panicky", |job| {
        if job.id == JobId(6) {
            panic!("matrix is singular");
        }
        Ok(ForecastOutput::new(points(1)))
    });
    let runner = JobRunner::new(store.clone(), Arc::new(backend));

    let summary = runner.scan(ScanId::new()).await?;
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.done, 1);

    let row = store.row(JobId(6));
    assert_eq!(row.status, JobStatus::Failed);
    let reason = row.error_reason.unwrap_or_default();
    assert!(reason.contains("matrix is singular"), "reason: {reason}");
    assert_eq!(row.finalize_calls, 1);

    Ok(())
}

#[tokio::test]
async fn test_prediction_write_failure_marks_job_failed() -> Result<(), Box<dyn Error>> {
    let store = MemoryQueueStore::new();
    store.add(forecast_job(8, 80, false));
    store.set_fail_predictions(true);

    let runner = JobRunner::new(store.clone(), Arc::new(fixed_backend(3)));
    let outcome = runner.run_job(ScanId::new(), &forecast_job(8, 80, false)).await?;

    let JobOutcome::Failed { reason } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(reason.starts_with("failed to store predictions"));
    assert_eq!(store.status(JobId(8)), JobStatus::Failed);

    Ok(())
}

#[tokio::test]
async fn test_events_follow_job_lifecycle() -> Result<(), Box<dyn Error>> {
    let store = MemoryQueueStore::new();
    store.add(forecast_job(1, 10, false));
    store.add(forecast_job(2, 20, false));
    // Claimed elsewhere before this scan loads.
    store.mark_processing(JobId(2), chrono::Utc::now());

    let (tx, mut rx) = broadcast::channel(64);
    let runner = JobRunner::new(store.clone(), Arc::new(fixed_backend(2))).with_event_tx(tx);

    let scan_id = ScanId::new();
    runner.scan(scan_id).await?;
    // Job 2 is no longer pending, so a direct run loses the claim.
    runner.run_job(scan_id, &forecast_job(2, 20, false)).await?;

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.scan_id(), scan_id);
        kinds.push(match event {
            ScanEvent::ScanStarted { pending, .. } => format!("started:{pending}"),
            ScanEvent::JobClaimed { job_id, .. } => format!("claimed:{job_id}"),
            ScanEvent::JobCompleted { job_id, predictions, .. } => {
                format!("completed:{job_id}:{predictions}")
            }
            ScanEvent::JobSkipped { job_id, .. } => format!("skipped:{job_id}"),
            ScanEvent::ScanCompleted { summary, .. } => format!("done:{}", summary.done),
            other => format!("unexpected:{}", other.description()),
        });
    }

    assert_eq!(
        kinds,
        vec![
            "started:1",
            "claimed:1",
            "completed:1:2",
            "done:1",
            "skipped:2",
        ]
    );

    Ok(())
}
