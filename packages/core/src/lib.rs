//! Core domain types for the forecast job queue.
//!
//! This crate contains shared types used across all packages:
//! - Job, JobStatus and the ForecastJob descriptor
//! - Model configuration enums and parameters
//! - Prediction output types
//! - Scan events for observing the daemon

mod events;
mod job;
mod model;
mod prediction;

pub use events::{ScanEvent, ScanId, ScanSummary};
pub use job::{ForecastJob, Job, JobId, JobStatus};
pub use model::{
    CountryId, DisplayType, ForecastType, ModelId, ModelParams, ParseEnumError, SeasonalityMode,
};
pub use prediction::{ForecastOutput, PredictionPoint};
