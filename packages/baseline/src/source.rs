//! Where the baseline backend reads observation series from.

use std::future::Future;
use std::pin::Pin;

use chrono::NaiveDate;
use db::DbError;
use db::repositories::{DatapointRepository, SeriesPoint};
use forecast_core::{CountryId, ForecastType};

pub type SeriesFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<SeriesPoint>, DbError>> + Send + 'a>>;

/// Read access to main-region observations.
pub trait SeriesSource: Send + Sync + 'static {
    /// Rows strictly after `since`, ascending by date.
    fn series(
        &self,
        country_id: CountryId,
        forecast_type: ForecastType,
        since: NaiveDate,
    ) -> SeriesFuture<'_>;
}

/// Series read through the SurrealDB datapoint table.
#[derive(Debug, Clone, Copy, Default)]
pub struct DbSeriesSource;

impl SeriesSource for DbSeriesSource {
    fn series(
        &self,
        country_id: CountryId,
        forecast_type: ForecastType,
        since: NaiveDate,
    ) -> SeriesFuture<'_> {
        Box::pin(DatapointRepository::series(country_id, forecast_type, since))
    }
}
