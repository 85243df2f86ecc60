//! Message types for actor communication.

use db::DbError;
use forecast_core::ScanSummary;
use ractor::RpcReplyPort;

use crate::scan_actor::ScanStats;

/// Messages for the ScanActor.
#[derive(Debug)]
pub enum ScanMessage {
    /// Periodic trigger. Runs a cycle, then schedules the next tick.
    Tick,

    /// Run a cycle now and report its summary.
    RunScan {
        reply: RpcReplyPort<Result<ScanSummary, DbError>>,
    },

    /// Get cumulative statistics.
    GetStats { reply: RpcReplyPort<ScanStats> },

    /// Stop after the current cycle.
    Shutdown,
}
