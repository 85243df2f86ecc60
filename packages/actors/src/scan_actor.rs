//! Scan actor: runs one scan cycle per tick, never two at once.

use std::time::Duration;

use chrono::{DateTime, Utc};
use db::DbError;
use forecast_core::{ScanId, ScanSummary};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use serde::{Deserialize, Serialize};

use crate::messages::ScanMessage;
use crate::runner::JobRunner;

/// Cumulative statistics of a scan actor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Cycles that ran to completion.
    pub cycles: u64,
    /// Cycles aborted by a store error.
    pub aborted: u64,
    pub reclaimed: u64,
    /// Sum of all completed cycle summaries.
    pub totals: ScanSummary,
    pub last_scan_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl ScanStats {
    fn record(&mut self, result: &Result<ScanSummary, DbError>) {
        self.last_scan_at = Some(Utc::now());
        match result {
            Ok(summary) => {
                self.cycles += 1;
                self.totals.loaded += summary.loaded;
                self.totals.skipped += summary.skipped;
                self.totals.done += summary.done;
                self.totals.failed += summary.failed;
                self.last_error = None;
            }
            Err(e) => {
                self.aborted += 1;
                self.last_error = Some(e.to_string());
            }
        }
    }
}

/// State for the scan actor.
pub struct ScanActorState {
    runner: JobRunner,
    interval: Duration,
    stale_after: Option<Duration>,
    stats: ScanStats,
    running: bool,
}

impl ScanActorState {
    async fn run_cycle(&mut self) -> Result<ScanSummary, DbError> {
        let scan_id = ScanId::new();
        let result = self.reclaim_and_scan(scan_id).await;
        self.stats.record(&result);
        result
    }

    async fn reclaim_and_scan(&mut self, scan_id: ScanId) -> Result<ScanSummary, DbError> {
        if let Some(stale_after) = self.stale_after {
            self.stats.reclaimed += self
                .runner
                .reclaim_stale(scan_id, stale_after)
                .await
                .inspect_err(|e| tracing::error!(%scan_id, error = %e, "stale reclaim failed"))?;
        }
        self.runner.scan(scan_id).await
    }
}

/// Scan actor arguments.
pub struct ScanArgs {
    pub runner: JobRunner,
    pub interval: Duration,
    pub stale_after: Option<Duration>,
}

/// Actor that drives the periodic scan loop.
///
/// The next tick is scheduled only after the current cycle returns, so a
/// slow cycle delays the following one instead of overlapping it.
pub struct ScanActor;

fn schedule_tick(myself: &ActorRef<ScanMessage>, after: Duration) {
    let myself = myself.clone();
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        // Fails only once the actor stopped.
        let _ = myself.send_message(ScanMessage::Tick);
    });
}

impl Actor for ScanActor {
    type Msg = ScanMessage;
    type State = ScanActorState;
    type Arguments = ScanArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            backend = args.runner.backend_name(),
            interval_ms = args.interval.as_millis() as u64,
            stale_after_secs = args.stale_after.map(|d| d.as_secs()),
            "Starting scan actor"
        );

        schedule_tick(&myself, args.interval);

        Ok(ScanActorState {
            runner: args.runner,
            interval: args.interval,
            stale_after: args.stale_after,
            stats: ScanStats::default(),
            running: true,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            ScanMessage::Tick => {
                if !state.running {
                    return Ok(());
                }

                // Errors are already logged and counted; the next tick retries.
                let _ = state.run_cycle().await;
                schedule_tick(&myself, state.interval);
            }

            ScanMessage::RunScan { reply } => {
                let result = state.run_cycle().await;
                let _ = reply.send(result);
            }

            ScanMessage::GetStats { reply } => {
                let _ = reply.send(state.stats.clone());
            }

            ScanMessage::Shutdown => {
                tracing::info!("Shutting down scan actor");
                state.running = false;
                myself.stop(None);
                return Ok(());
            }
        }

        Ok(())
    }
}
