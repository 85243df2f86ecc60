//! Scheduler handle owned by the process entry point.

use std::time::Duration;

use db::DbError;
use forecast_core::{ScanEvent, ScanSummary};
use ractor::rpc::CallResult;
use ractor::{Actor, ActorRef};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::messages::ScanMessage;
use crate::runner::JobRunner;
use crate::scan_actor::{ScanActor, ScanArgs, ScanStats};

const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
const EVENT_CAPACITY: usize = 1024;
const STATS_TIMEOUT: Duration = Duration::from_secs(5);

/// Scheduler timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Delay between the end of one cycle and the start of the next.
    pub interval: Duration,
    /// Reclaim PROCESSING jobs older than this before each cycle.
    pub stale_after: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            stale_after: None,
        }
    }
}

impl SchedulerConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = Some(stale_after);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("failed to spawn scan actor: {0}")]
    Spawn(#[from] ractor::SpawnErr),

    #[error("scan actor is not running")]
    NotRunning,

    #[error("scan actor did not answer in time")]
    Timeout,

    #[error("scan aborted: {0}")]
    Scan(#[from] DbError),

    #[error("scan actor task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Running scan loop.
///
/// Dropping the scheduler leaves the actor running; call
/// [`Scheduler::shutdown`] to stop it after the current cycle.
pub struct Scheduler {
    actor: ActorRef<ScanMessage>,
    handle: JoinHandle<()>,
    event_tx: broadcast::Sender<ScanEvent>,
}

impl Scheduler {
    /// Spawn the scan actor. The first tick fires one interval from now.
    pub async fn start(runner: JobRunner, config: SchedulerConfig) -> Result<Self, SchedulerError> {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let args = ScanArgs {
            runner: runner.with_event_tx(event_tx.clone()),
            interval: config.interval,
            stale_after: config.stale_after,
        };

        let (actor, handle) = Actor::spawn(None, ScanActor, args).await?;

        Ok(Self {
            actor,
            handle,
            event_tx,
        })
    }

    /// Subscribe to scan events.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.event_tx.subscribe()
    }

    /// Run a cycle now, queued behind any cycle already in progress.
    pub async fn run_now(&self) -> Result<ScanSummary, SchedulerError> {
        let result = ractor::rpc::call(&self.actor, |reply| ScanMessage::RunScan { reply }, None)
            .await
            .map_err(|_| SchedulerError::NotRunning)?;

        match result {
            CallResult::Success(summary) => Ok(summary?),
            CallResult::Timeout => Err(SchedulerError::Timeout),
            CallResult::SenderError => Err(SchedulerError::NotRunning),
        }
    }

    /// Cumulative statistics.
    pub async fn stats(&self) -> Result<ScanStats, SchedulerError> {
        let result = ractor::rpc::call(
            &self.actor,
            |reply| ScanMessage::GetStats { reply },
            Some(STATS_TIMEOUT),
        )
        .await
        .map_err(|_| SchedulerError::NotRunning)?;

        match result {
            CallResult::Success(stats) => Ok(stats),
            CallResult::Timeout => Err(SchedulerError::Timeout),
            CallResult::SenderError => Err(SchedulerError::NotRunning),
        }
    }

    /// Stop the loop and wait for the in-flight cycle to finish.
    pub async fn shutdown(self) -> Result<(), SchedulerError> {
        // Already stopped is fine; the join below still completes.
        let _ = self.actor.send_message(ScanMessage::Shutdown);
        self.handle.await?;
        Ok(())
    }
}
