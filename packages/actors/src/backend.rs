//! Forecast backend trait: the compute step of a job.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;

use db::DbError;
use forecast_core::{ForecastJob, ForecastOutput};

/// Future type for async forecast computations.
pub type ComputeFuture = Pin<Box<dyn Future<Output = Result<ForecastOutput, ComputeError>> + Send>>;

/// Why a computation produced no forecast.
///
/// The `Display` text ends up verbatim in the job's `error_reason`.
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    #[error("insufficient data")]
    InsufficientData,

    #[error("data access failed: {0}")]
    Data(#[from] DbError),

    #[error("panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Failed(String),
}

impl ComputeError {
    pub fn failed(reason: impl Into<String>) -> Self {
        ComputeError::Failed(reason.into())
    }

    /// Wrap a caught panic payload.
    pub fn panicked(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        ComputeError::Panicked(message)
    }
}

/// Trait for forecast backends.
///
/// Implement this trait to plug a forecasting method into the runner. The
/// backend receives the fully assembled job and returns its predictions;
/// it never touches the job's status.
pub trait ForecastBackend: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Produce a forecast for `job`.
    fn compute(&self, job: &ForecastJob) -> ComputeFuture;
}

/// A simple function-based backend.
pub struct FnBackend<F>
where
    F: Fn(&ForecastJob) -> ComputeFuture + Send + Sync + 'static,
{
    name: String,
    compute: F,
}

impl<F> FnBackend<F>
where
    F: Fn(&ForecastJob) -> ComputeFuture + Send + Sync + 'static,
{
    /// Create a new function-based backend.
    pub fn new(name: impl Into<String>, compute: F) -> Self {
        Self {
            name: name.into(),
            compute,
        }
    }
}

impl<F> ForecastBackend for FnBackend<F>
where
    F: Fn(&ForecastJob) -> ComputeFuture + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn compute(&self, job: &ForecastJob) -> ComputeFuture {
        (self.compute)(job)
    }
}

/// Helper macro for creating forecast backends from async closures.
#[macro_export]
macro_rules! forecast_backend {
    ($name:expr, |$job:ident| $body:expr) => {
        $crate::FnBackend::new($name, |$job: &$crate::ForecastJob| {
            let $job = $job.clone();
            Box::pin(async move {
                let output: Result<$crate::ForecastOutput, $crate::ComputeError> = $body;
                output
            }) as $crate::ComputeFuture
        })
    };
}
