//! Event types for observing scan cycles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::{JobId, ModelId};

/// Identifier of one scan cycle, used to correlate log lines and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanId(pub Ulid);

impl ScanId {
    /// Create a new unique scan ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ScanId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ScanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-cycle outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSummary {
    /// Jobs returned by the pending load.
    pub loaded: u64,
    /// Jobs another worker claimed first.
    pub skipped: u64,
    pub done: u64,
    pub failed: u64,
}

impl ScanSummary {
    /// Jobs this worker claimed and finalized.
    pub fn processed(&self) -> u64 {
        self.done + self.failed
    }
}

/// Events emitted by the scan loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEvent {
    /// A scan cycle loaded its pending batch.
    ScanStarted {
        scan_id: ScanId,
        pending: u64,
        timestamp: DateTime<Utc>,
    },
    /// This worker claimed a job.
    JobClaimed {
        scan_id: ScanId,
        job_id: JobId,
        model_id: ModelId,
        timestamp: DateTime<Utc>,
    },
    /// The claim lost a race; the job was left alone.
    JobSkipped {
        scan_id: ScanId,
        job_id: JobId,
        timestamp: DateTime<Utc>,
    },
    /// A job finished with status DONE.
    JobCompleted {
        scan_id: ScanId,
        job_id: JobId,
        predictions: u64,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// A job finished with status FAILED.
    JobFailed {
        scan_id: ScanId,
        job_id: JobId,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// Stale PROCESSING jobs were put back in the queue.
    JobsReclaimed {
        scan_id: ScanId,
        count: u64,
        timestamp: DateTime<Utc>,
    },
    /// A scan cycle processed its whole batch.
    ScanCompleted {
        scan_id: ScanId,
        summary: ScanSummary,
        timestamp: DateTime<Utc>,
    },
    /// A store failure aborted the cycle; it will be retried next tick.
    ScanAborted {
        scan_id: ScanId,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl ScanEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ScanEvent::ScanStarted { timestamp, .. } => *timestamp,
            ScanEvent::JobClaimed { timestamp, .. } => *timestamp,
            ScanEvent::JobSkipped { timestamp, .. } => *timestamp,
            ScanEvent::JobCompleted { timestamp, .. } => *timestamp,
            ScanEvent::JobFailed { timestamp, .. } => *timestamp,
            ScanEvent::JobsReclaimed { timestamp, .. } => *timestamp,
            ScanEvent::ScanCompleted { timestamp, .. } => *timestamp,
            ScanEvent::ScanAborted { timestamp, .. } => *timestamp,
        }
    }

    /// Get the scan cycle this event belongs to.
    pub fn scan_id(&self) -> ScanId {
        match self {
            ScanEvent::ScanStarted { scan_id, .. } => *scan_id,
            ScanEvent::JobClaimed { scan_id, .. } => *scan_id,
            ScanEvent::JobSkipped { scan_id, .. } => *scan_id,
            ScanEvent::JobCompleted { scan_id, .. } => *scan_id,
            ScanEvent::JobFailed { scan_id, .. } => *scan_id,
            ScanEvent::JobsReclaimed { scan_id, .. } => *scan_id,
            ScanEvent::ScanCompleted { scan_id, .. } => *scan_id,
            ScanEvent::ScanAborted { scan_id, .. } => *scan_id,
        }
    }

    /// Get the job ID associated with this event, if any.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            ScanEvent::JobClaimed { job_id, .. } => Some(*job_id),
            ScanEvent::JobSkipped { job_id, .. } => Some(*job_id),
            ScanEvent::JobCompleted { job_id, .. } => Some(*job_id),
            ScanEvent::JobFailed { job_id, .. } => Some(*job_id),
            _ => None,
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            ScanEvent::ScanStarted { pending, .. } => {
                format!("Scan started with {} pending jobs", pending)
            }
            ScanEvent::JobClaimed {
                job_id, model_id, ..
            } => format!("Job {} claimed (model {})", job_id, model_id),
            ScanEvent::JobSkipped { job_id, .. } => {
                format!("Job {} skipped, already claimed", job_id)
            }
            ScanEvent::JobCompleted {
                job_id,
                predictions,
                duration_ms,
                ..
            } => format!(
                "Job {} done in {}ms ({} predictions)",
                job_id, duration_ms, predictions
            ),
            ScanEvent::JobFailed { job_id, error, .. } => {
                format!("Job {} failed: {}", job_id, error)
            }
            ScanEvent::JobsReclaimed { count, .. } => {
                format!("{} stale jobs returned to the queue", count)
            }
            ScanEvent::ScanCompleted { summary, .. } => format!(
                "Scan completed: {} done, {} failed, {} skipped",
                summary.done, summary.failed, summary.skipped
            ),
            ScanEvent::ScanAborted { error, .. } => format!("Scan aborted: {}", error),
        }
    }
}
