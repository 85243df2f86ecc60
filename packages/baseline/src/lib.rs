//! Baseline forecasting backend.
//!
//! Fits a piecewise-linear trend with weekly seasonality and optional
//! country holidays to a country's observation series, extends it over the
//! job's horizon and, when asked, scores it by rolling-origin
//! cross-validation.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use actors::{DbQueueStore, JobRunner};
//! use baseline::BaselineBackend;
//!
//! let backend = BaselineBackend::from_database().with_artifacts(storage);
//! let runner = JobRunner::new(Arc::new(DbQueueStore), Arc::new(backend));
//! ```

mod backend;
mod holidays;
mod linalg;
mod model;
mod prepare;
mod score;
mod source;

pub use backend::BaselineBackend;
pub use holidays::{HolidayCalendar, HolidayError};
pub use model::{FitError, FitOptions, MIN_OBSERVATIONS, TrendModel};
pub use prepare::{Observation, PreparedSeries, prepare};
pub use score::{CrossValidation, HORIZON_DAYS, HeldOut, INITIAL_DAYS, cross_validate};
pub use source::{DbSeriesSource, SeriesFuture, SeriesSource};
