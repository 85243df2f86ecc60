//! Job domain types for queued forecast requests.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{CountryId, DisplayType, ForecastType, ModelId, ModelParams, ParseEnumError};

/// Unique identifier for a job. Assigned by whoever enqueues the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a job.
///
/// The only valid path is `InQueue -> Processing -> Done | Failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Waiting to be claimed by a worker.
    #[default]
    InQueue,
    /// Claimed by a worker; computation in progress.
    Processing,
    /// Computation finished and predictions were stored.
    Done,
    /// Computation failed; see the job's error reason.
    Failed,
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    /// Check whether moving from `self` to `next` is a legal lifecycle step.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::InQueue, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Done)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }

    /// The persisted string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::InQueue => "IN_QUEUE",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Done => "DONE",
            JobStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_QUEUE" => Ok(JobStatus::InQueue),
            "PROCESSING" => Ok(JobStatus::Processing),
            "DONE" => Ok(JobStatus::Done),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(ParseEnumError::new("job status", other)),
        }
    }
}

/// A persisted job row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub model_id: ModelId,
    pub status: JobStatus,
    #[serde(default)]
    pub with_score: bool,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_reason: Option<String>,
}

impl Job {
    /// Duration between claim and finalize, if both happened.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

/// Everything a forecast backend needs to run one job.
///
/// Assembled once at load time from the job, its model, the model's country
/// and change points. The runner never reloads it mid-execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastJob {
    pub id: JobId,
    pub model_id: ModelId,
    pub country_id: CountryId,
    /// ISO code used for the holiday calendar lookup.
    pub country_iso_code: String,
    pub forecast_type: ForecastType,
    pub display_type: DisplayType,
    pub params: ModelParams,
    /// Change points supplied by the model; empty means detect automatically.
    #[serde(default)]
    pub change_points: Vec<NaiveDate>,
    #[serde(default)]
    pub with_score: bool,
}

impl ForecastJob {
    /// Days past the last observation to predict: a third of the look-back window.
    pub fn horizon_days(&self) -> u32 {
        (f64::from(self.params.days_to_look_back) / 3.0).round() as u32
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[test]
    fn only_forward_transitions_are_legal() {
        use JobStatus::*;
        assert!(InQueue.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Done));
        assert!(Processing.can_transition_to(Failed));

        assert!(!InQueue.can_transition_to(Done));
        assert!(!InQueue.can_transition_to(Failed));
        assert!(!Done.can_transition_to(InQueue));
        assert!(!Failed.can_transition_to(Processing));
        assert!(!Processing.can_transition_to(InQueue));
    }

    #[test]
    fn status_uses_screaming_snake_case() {
        let json = serde_json::to_string(&JobStatus::InQueue).unwrap();
        assert_eq!(json, "\"IN_QUEUE\"");
        assert_eq!("FAILED".parse::<JobStatus>().unwrap(), JobStatus::Failed);
        assert!("done".parse::<JobStatus>().is_err());
        assert!(JobStatus::Done.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }
}
