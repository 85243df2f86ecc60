//! Prediction repository: full-replace storage of a model's forecast.

use chrono::NaiveDate;
use forecast_core::{ModelId, PredictionPoint};
use serde::{Deserialize, Serialize};

use crate::{DbError, get_db};

/// Repository for prediction persistence operations.
pub struct PredictionRepository;

/// Wire shape of a prediction row.
#[derive(Debug, Serialize, Deserialize)]
struct PredictionRecord {
    date: String,
    point_estimate: f64,
    lower_bound: f64,
    upper_bound: f64,
    is_change_point: bool,
}

impl PredictionRecord {
    fn from_point(point: &PredictionPoint) -> Result<Self, DbError> {
        let values = [point.point_estimate, point.lower_bound, point.upper_bound];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(DbError::Serialization(format!(
                "prediction for {} is not finite",
                point.date
            )));
        }

        Ok(Self {
            date: point.date.format("%Y-%m-%d").to_string(),
            point_estimate: point.point_estimate,
            lower_bound: point.lower_bound,
            upper_bound: point.upper_bound,
            is_change_point: point.is_change_point,
        })
    }

    fn into_point(self) -> Result<PredictionPoint, DbError> {
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .map_err(|e| DbError::Serialization(format!("prediction date {}: {}", self.date, e)))?;

        Ok(PredictionPoint {
            date,
            point_estimate: self.point_estimate,
            lower_bound: self.lower_bound,
            upper_bound: self.upper_bound,
            is_change_point: self.is_change_point,
        })
    }
}

impl PredictionRepository {
    /// Replace every prediction of `model_id` with `points`.
    ///
    /// Delete and insert run in one transaction, so readers see either the
    /// old set or the new one.
    pub async fn replace_for_model(
        model_id: ModelId,
        points: &[PredictionPoint],
    ) -> Result<u64, DbError> {
        let records = points
            .iter()
            .map(PredictionRecord::from_point)
            .collect::<Result<Vec<_>, _>>()?;
        let count = records.len() as u64;

        let db = get_db()?;

        db.query(
            r#"
            BEGIN TRANSACTION;
            DELETE prediction WHERE model = type::thing("model", $model_id);
            FOR $point IN $points {
                CREATE prediction SET
                    model = type::thing("model", $model_id),
                    date = $point.date,
                    point_estimate = $point.point_estimate,
                    lower_bound = $point.lower_bound,
                    upper_bound = $point.upper_bound,
                    is_change_point = $point.is_change_point;
            };
            COMMIT TRANSACTION;
            "#,
        )
        .bind(("model_id", model_id.0))
        .bind(("points", records))
        .await?
        .check()?;

        tracing::debug!(model_id = %model_id, count, "predictions replaced");

        Ok(count)
    }

    /// List the stored predictions of a model, ordered by date.
    pub async fn list_for_model(model_id: ModelId) -> Result<Vec<PredictionPoint>, DbError> {
        let db = get_db()?;

        let mut result = db
            .query(
                r#"
                SELECT date, point_estimate, lower_bound, upper_bound, is_change_point
                FROM prediction
                WHERE model = type::thing("model", $model_id)
                ORDER BY date ASC
                "#,
            )
            .bind(("model_id", model_id.0))
            .await?;

        let records: Vec<PredictionRecord> = result.take(0)?;

        records.into_iter().map(PredictionRecord::into_point).collect()
    }
}
