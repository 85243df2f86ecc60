//! Datapoint repository: the observed series forecasts are fitted on.

use chrono::NaiveDate;
use forecast_core::{CountryId, ForecastType};
use serde::Deserialize;

use crate::{DbError, get_db};

/// Repository for observed datapoints.
pub struct DatapointRepository;

/// One observation of the selected quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    /// Missing when the source did not report the quantity that day.
    pub value: Option<f64>,
}

/// A datapoint to insert.
#[derive(Debug, Clone)]
pub struct NewDatapoint {
    pub country_id: CountryId,
    pub date: NaiveDate,
    pub main_region: bool,
    pub cases: Option<f64>,
    pub deaths: Option<f64>,
    pub tests: Option<f64>,
}

impl NewDatapoint {
    /// A main-region datapoint with no values set.
    pub fn new(country_id: CountryId, date: NaiveDate) -> Self {
        Self {
            country_id,
            date,
            main_region: true,
            cases: None,
            deaths: None,
            tests: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SeriesRow {
    date: String,
    #[serde(default)]
    value: Option<f64>,
}

impl DatapointRepository {
    /// Insert a datapoint.
    pub async fn insert(point: &NewDatapoint) -> Result<(), DbError> {
        let db = get_db()?;

        db.query(
            r#"
            CREATE datapoint SET
                country = type::thing("country", $country_id),
                date = $date,
                main_region = $main_region,
                cases = $cases,
                deaths = $deaths,
                tests = $tests
            "#,
        )
        .bind(("country_id", point.country_id.0))
        .bind(("date", point.date.format("%Y-%m-%d").to_string()))
        .bind(("main_region", point.main_region))
        .bind(("cases", point.cases))
        .bind(("deaths", point.deaths))
        .bind(("tests", point.tests))
        .await?
        .check()?;

        Ok(())
    }

    /// Main-region series of `forecast_type` for a country, strictly after `since`.
    pub async fn series(
        country_id: CountryId,
        forecast_type: ForecastType,
        since: NaiveDate,
    ) -> Result<Vec<SeriesPoint>, DbError> {
        let db = get_db()?;

        // The column comes from a fixed enum mapping, never from stored text.
        let query = format!(
            r#"
            SELECT date, {} AS value
            FROM datapoint
            WHERE country = type::thing("country", $country_id)
                AND main_region = true
                AND date > $since
            ORDER BY date ASC
            "#,
            forecast_type.column()
        );

        let mut result = db
            .query(query)
            .bind(("country_id", country_id.0))
            .bind(("since", since.format("%Y-%m-%d").to_string()))
            .await?;

        let rows: Vec<SeriesRow> = result.take(0)?;

        rows.into_iter()
            .map(|row| {
                let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|e| {
                    DbError::Serialization(format!("datapoint date {}: {}", row.date, e))
                })?;
                Ok(SeriesPoint {
                    date,
                    value: row.value,
                })
            })
            .collect()
    }
}
