#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use actors::{JobRunner, Scheduler, SchedulerConfig, SchedulerError};
use chrono::Utc;
use common::{MemoryQueueStore, fixed_backend, forecast_job};
use forecast_core::{JobId, JobStatus, ScanEvent};
use tokio::time::timeout;

const LONG: Duration = Duration::from_secs(3600);

#[tokio::test]
async fn test_run_now_processes_pending_jobs() -> Result<(), Box<dyn Error>> {
    let store = MemoryQueueStore::new();
    store.add(forecast_job(1, 10, false));
    store.add(forecast_job(2, 20, false));

    let runner = JobRunner::new(store.clone(), Arc::new(fixed_backend(5)));
    let scheduler = Scheduler::start(runner, SchedulerConfig::default().with_interval(LONG)).await?;

    let summary = scheduler.run_now().await?;
    assert_eq!(summary.loaded, 2);
    assert_eq!(summary.done, 2);

    // Nothing left on the second pass.
    let again = scheduler.run_now().await?;
    assert_eq!(again.loaded, 0);

    let stats = scheduler.stats().await?;
    assert_eq!(stats.cycles, 2);
    assert_eq!(stats.totals.done, 2);
    assert_eq!(stats.aborted, 0);
    assert!(stats.last_scan_at.is_some());

    scheduler.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_tick_runs_scan_and_broadcasts_events() -> Result<(), Box<dyn Error>> {
    let store = MemoryQueueStore::new();
    store.add(forecast_job(1, 10, false));

    let runner = JobRunner::new(store.clone(), Arc::new(fixed_backend(3)));
    let config = SchedulerConfig::default().with_interval(Duration::from_millis(20));
    let scheduler = Scheduler::start(runner, config).await?;
    let mut events = scheduler.subscribe();

    let completed = timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(ScanEvent::JobCompleted { job_id, predictions, .. }) => {
                    break Some((job_id, predictions));
                }
                Ok(_) => continue,
                Err(_) => break None,
            }
        }
    })
    .await?;
    assert_eq!(completed, Some((JobId(1), 3)));
    assert_eq!(store.status(JobId(1)), JobStatus::Done);

    // Ticks keep coming after the queue is empty.
    let next_scan = timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(ScanEvent::ScanCompleted { summary, .. }) = events.recv().await
                && summary.loaded == 0
            {
                break;
            }
        }
    })
    .await;
    assert!(next_scan.is_ok());

    scheduler.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_aborted_cycle_is_counted_and_retried() -> Result<(), Box<dyn Error>> {
    let store = MemoryQueueStore::new();
    store.add(forecast_job(3, 30, false));

    let runner = JobRunner::new(store.clone(), Arc::new(fixed_backend(1)));
    let scheduler = Scheduler::start(runner, SchedulerConfig::default().with_interval(LONG)).await?;
    let mut events = scheduler.subscribe();

    store.set_unreachable(true);
    let aborted = scheduler.run_now().await;
    assert!(matches!(aborted, Err(SchedulerError::Scan(_))));
    assert!(matches!(
        events.try_recv(),
        Ok(ScanEvent::ScanAborted { .. })
    ));

    let stats = scheduler.stats().await?;
    assert_eq!(stats.aborted, 1);
    assert!(stats.last_error.is_some());

    store.set_unreachable(false);
    let summary = scheduler.run_now().await?;
    assert_eq!(summary.done, 1);
    assert_eq!(store.status(JobId(3)), JobStatus::Done);

    let stats = scheduler.stats().await?;
    assert!(stats.last_error.is_none());

    scheduler.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_stale_jobs_are_reclaimed_when_enabled() -> Result<(), Box<dyn Error>> {
    let store = MemoryQueueStore::new();
    store.add(forecast_job(4, 40, false));
    store.add(forecast_job(5, 50, false));
    store.mark_processing(JobId(4), Utc::now() - chrono::Duration::hours(2));
    store.mark_processing(JobId(5), Utc::now());

    let runner = JobRunner::new(store.clone(), Arc::new(fixed_backend(1)));
    let config = SchedulerConfig::default()
        .with_interval(LONG)
        .with_stale_after(Duration::from_secs(600));
    let scheduler = Scheduler::start(runner, config).await?;

    let summary = scheduler.run_now().await?;
    assert_eq!(summary.done, 1);
    assert_eq!(store.status(JobId(4)), JobStatus::Done);
    // Recently claimed jobs are left with their worker.
    assert_eq!(store.status(JobId(5)), JobStatus::Processing);

    let stats = scheduler.stats().await?;
    assert_eq!(stats.reclaimed, 1);

    scheduler.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_stale_jobs_stay_put_by_default() -> Result<(), Box<dyn Error>> {
    let store = MemoryQueueStore::new();
    store.add(forecast_job(6, 60, false));
    store.mark_processing(JobId(6), Utc::now() - chrono::Duration::days(1));

    let runner = JobRunner::new(store.clone(), Arc::new(fixed_backend(1)));
    let scheduler = Scheduler::start(runner, SchedulerConfig::default().with_interval(LONG)).await?;

    let summary = scheduler.run_now().await?;
    assert_eq!(summary.loaded, 0);
    assert_eq!(store.status(JobId(6)), JobStatus::Processing);

    scheduler.shutdown().await?;
    Ok(())
}
