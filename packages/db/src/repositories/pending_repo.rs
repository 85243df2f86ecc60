//! Pending job loader: assembles `ForecastJob` descriptors for a scan.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use forecast_core::{
    CountryId, DisplayType, ForecastJob, ForecastType, JobId, ModelId, ModelParams,
    SeasonalityMode,
};
use serde::Deserialize;

use crate::{DbError, get_db};

/// Repository that reads the pending batch for a scan cycle.
pub struct PendingJobRepository;

/// Job joined with its model and country.
#[derive(Debug, Deserialize)]
struct PendingRow {
    id: i64,
    model_id: i64,
    with_score: bool,
    country_id: i64,
    country_iso_code: String,
    forecast_type: String,
    display_type: String,
    smoothing: u32,
    rolling_sum_window: u32,
    days_to_look_back: u32,
    num_change_points: u32,
    change_point_range: f64,
    seasonality_mode: String,
    change_point_prior_scale: f64,
    holidays_prior_scale: f64,
    seasonality_prior_scale: f64,
    add_country_holidays: bool,
}

#[derive(Debug, Deserialize)]
struct ChangePointRow {
    model_id: i64,
    date: String,
}

impl PendingRow {
    fn into_job(self, change_points: Vec<NaiveDate>) -> Result<ForecastJob, DbError> {
        let forecast_type: ForecastType = self
            .forecast_type
            .parse()
            .map_err(|e| DbError::Serialization(format!("job {}: {}", self.id, e)))?;

        let display_type: DisplayType = self
            .display_type
            .parse()
            .map_err(|e| DbError::Serialization(format!("job {}: {}", self.id, e)))?;

        let seasonality_mode: SeasonalityMode = self
            .seasonality_mode
            .parse()
            .map_err(|e| DbError::Serialization(format!("job {}: {}", self.id, e)))?;

        Ok(ForecastJob {
            id: JobId(self.id),
            model_id: ModelId(self.model_id),
            country_id: CountryId(self.country_id),
            country_iso_code: self.country_iso_code,
            forecast_type,
            display_type,
            params: ModelParams {
                smoothing: self.smoothing,
                rolling_sum_window: self.rolling_sum_window,
                days_to_look_back: self.days_to_look_back,
                num_change_points: self.num_change_points,
                change_point_range: self.change_point_range,
                seasonality_mode,
                change_point_prior_scale: self.change_point_prior_scale,
                holidays_prior_scale: self.holidays_prior_scale,
                seasonality_prior_scale: self.seasonality_prior_scale,
                add_country_holidays: self.add_country_holidays,
            },
            change_points,
            with_score: self.with_score,
        })
    }
}

impl PendingJobRepository {
    /// Load every IN_QUEUE job with its model, country and change points.
    ///
    /// Jobs come back in id order. That is the store's scan order and says
    /// nothing about urgency. Jobs whose model or country is missing are not
    /// pending; rows that still fail to convert are logged and left out so
    /// the rest of the batch runs.
    pub async fn load_pending() -> Result<Vec<ForecastJob>, DbError> {
        let db = get_db()?;

        let mut result = db
            .query(
                r#"
                SELECT
                    record::id(id) AS id,
                    record::id(model) AS model_id,
                    with_score,
                    record::id(model.country) AS country_id,
                    model.country.iso_code AS country_iso_code,
                    model.forecast_type AS forecast_type,
                    model.display_type AS display_type,
                    model.smoothing AS smoothing,
                    model.rolling_sum_window AS rolling_sum_window,
                    model.days_to_look_back AS days_to_look_back,
                    model.num_change_points AS num_change_points,
                    model.change_point_range AS change_point_range,
                    model.seasonality_mode AS seasonality_mode,
                    model.change_point_prior_scale AS change_point_prior_scale,
                    model.holidays_prior_scale AS holidays_prior_scale,
                    model.seasonality_prior_scale AS seasonality_prior_scale,
                    model.add_country_holidays AS add_country_holidays
                FROM job
                WHERE status = "IN_QUEUE"
                    AND model.id IS NOT NONE
                    AND model.country.iso_code IS NOT NONE
                ORDER BY id ASC
                "#,
            )
            .await?;

        let raw: Vec<serde_json::Value> = result.take(0)?;
        let rows: Vec<PendingRow> = raw
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<PendingRow>(value.clone()) {
                Ok(row) => Some(row),
                Err(e) => {
                    tracing::warn!(row = %value, error = %e, "skipping undecodable pending job");
                    None
                }
            })
            .collect();

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let model_ids: Vec<i64> = rows
            .iter()
            .map(|r| r.model_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let change_points = Self::change_points_for(model_ids).await?;

        let jobs: Vec<ForecastJob> = rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id;
                let points = change_points.get(&row.model_id).cloned().unwrap_or_default();
                row.into_job(points)
                    .inspect_err(|e| tracing::warn!(job_id = id, error = %e, "skipping pending job"))
                    .ok()
            })
            .collect();

        tracing::debug!(count = jobs.len(), "loaded pending jobs");

        Ok(jobs)
    }

    /// Change points per model, sorted by date.
    async fn change_points_for(
        model_ids: Vec<i64>,
    ) -> Result<HashMap<i64, Vec<NaiveDate>>, DbError> {
        let db = get_db()?;

        let mut result = db
            .query(
                r#"
                SELECT record::id(model) AS model_id, date
                FROM change_point
                WHERE record::id(model) INSIDE $model_ids
                ORDER BY date ASC
                "#,
            )
            .bind(("model_ids", model_ids))
            .await?;

        let rows: Vec<ChangePointRow> = result.take(0)?;

        let mut by_model: HashMap<i64, Vec<NaiveDate>> = HashMap::new();
        for row in rows {
            match NaiveDate::parse_from_str(&row.date, "%Y-%m-%d") {
                Ok(date) => by_model.entry(row.model_id).or_default().push(date),
                Err(e) => tracing::warn!(
                    model_id = row.model_id,
                    date = %row.date,
                    error = %e,
                    "ignoring malformed change point"
                ),
            }
        }

        Ok(by_model)
    }
}
