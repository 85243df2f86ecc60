//! [`ForecastBackend`] built on the trend model.

use std::sync::Arc;

use actors::{ComputeError, ComputeFuture, ForecastBackend};
use chrono::{Days, NaiveDate, Utc};
use forecast_core::{ForecastJob, ForecastOutput};
use storage::{ArtifactKind, Storage, artifact_key};

use crate::holidays::HolidayCalendar;
use crate::model::{FitError, FitOptions, MIN_OBSERVATIONS, TrendModel};
use crate::prepare::{PreparedSeries, prepare};
use crate::score::{CrossValidation, cross_validate};
use crate::source::{DbSeriesSource, SeriesSource};

impl From<FitError> for ComputeError {
    fn from(err: FitError) -> Self {
        match err {
            FitError::InsufficientData => ComputeError::InsufficientData,
            other => ComputeError::failed(other.to_string()),
        }
    }
}

/// Forecasts a job's series with [`TrendModel`], optionally scoring it by
/// cross-validation and writing diagnostics to artifact storage.
#[derive(Clone)]
pub struct BaselineBackend {
    source: Arc<dyn SeriesSource>,
    artifacts: Option<Storage>,
    today: Option<NaiveDate>,
}

impl std::fmt::Debug for BaselineBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaselineBackend")
            .field("artifacts", &self.artifacts)
            .field("today", &self.today)
            .finish_non_exhaustive()
    }
}

impl BaselineBackend {
    pub fn new(source: Arc<dyn SeriesSource>) -> Self {
        Self {
            source,
            artifacts: None,
            today: None,
        }
    }

    /// Backend reading from the initialized database.
    pub fn from_database() -> Self {
        Self::new(Arc::new(DbSeriesSource))
    }

    /// Write prediction and score tables of every job to `storage`.
    pub fn with_artifacts(mut self, storage: Storage) -> Self {
        self.artifacts = Some(storage);
        self
    }

    /// Pin the date the look-back window is measured from.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }

    async fn run(&self, job: ForecastJob) -> Result<ForecastOutput, ComputeError> {
        let since = self
            .today()
            .checked_sub_days(Days::new(u64::from(job.params.days_to_look_back)))
            .ok_or_else(|| ComputeError::failed("look-back window out of range"))?;

        let series = self
            .source
            .series(job.country_id, job.forecast_type, since)
            .await?;
        let prepared = prepare(&series, job.display_type, &job.params);
        tracing::debug!(
            job_id = %job.id,
            rows = series.len(),
            observations = prepared.observations.len(),
            cap = ?prepared.cap,
            "series prepared"
        );

        let holidays = if job.params.add_country_holidays {
            match HolidayCalendar::for_country(&job.country_iso_code) {
                Ok(calendar) => Some(calendar),
                Err(e) => {
                    tracing::warn!(job_id = %job.id, error = %e, "fitting without holidays");
                    None
                }
            }
        } else {
            None
        };

        let job_id = job.id;
        let (output, validation) = tokio::task::spawn_blocking(move || fit(&job, prepared, holidays))
            .await
            .map_err(|e| {
                if e.is_panic() {
                    ComputeError::panicked(e.into_panic())
                } else {
                    ComputeError::failed(format!("forecast task cancelled: {e}"))
                }
            })??;

        if let Some(storage) = &self.artifacts {
            write_artifacts(storage, job_id, &output, validation.as_ref()).await;
        }

        Ok(output)
    }
}

impl ForecastBackend for BaselineBackend {
    fn name(&self) -> &str {
        "baseline"
    }

    fn compute(&self, job: &ForecastJob) -> ComputeFuture {
        let backend = self.clone();
        let job = job.clone();
        Box::pin(async move { backend.run(job).await })
    }
}

/// Fit, predict over the queried dates plus the horizon, and score if asked.
fn fit(
    job: &ForecastJob,
    prepared: PreparedSeries,
    holidays: Option<HolidayCalendar>,
) -> Result<(ForecastOutput, Option<CrossValidation>), ComputeError> {
    let Some(cap) = prepared.cap else {
        return Err(ComputeError::InsufficientData);
    };
    if prepared.observations.len() < MIN_OBSERVATIONS {
        return Err(ComputeError::InsufficientData);
    }

    let options = FitOptions {
        params: &job.params,
        change_points: &job.change_points,
        holidays: holidays.as_ref(),
        cap,
    };
    let model = TrendModel::fit(&prepared.observations, &options)?;

    let Some(&last) = prepared.dates.last() else {
        return Err(ComputeError::InsufficientData);
    };
    let horizon = (1..=u64::from(job.horizon_days())).filter_map(|ahead| last.checked_add_days(Days::new(ahead)));
    let predictions = model.predict_all(prepared.dates.iter().copied().chain(horizon));

    let mut output =
        ForecastOutput::new(predictions).with_change_points(model.change_points().iter().copied());

    let validation = if job.with_score {
        let validation = cross_validate(&prepared.observations, &options)?;
        output = output.with_score(validation.mape);
        Some(validation)
    } else {
        None
    };

    Ok((output, validation))
}

async fn write_artifacts(
    storage: &Storage,
    job_id: forecast_core::JobId,
    output: &ForecastOutput,
    validation: Option<&CrossValidation>,
) {
    let key = artifact_key(job_id, ArtifactKind::Prediction);
    if let Err(e) = storage.put_json(&key, output).await {
        tracing::warn!(%job_id, %key, error = %e, "failed to write prediction artifact");
    }

    if let Some(validation) = validation {
        let key = artifact_key(job_id, ArtifactKind::Score);
        if let Err(e) = storage.put_json(&key, validation).await {
            tracing::warn!(%job_id, %key, error = %e, "failed to write score artifact");
        }
    }
}
