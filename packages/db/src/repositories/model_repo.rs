//! Model repository: countries, model configurations and change points.
//!
//! The scheduler only reads these tables; the write side exists for
//! provisioning and tests.

use chrono::NaiveDate;
use forecast_core::{CountryId, DisplayType, ForecastType, ModelId, ModelParams};

use crate::{DbError, get_db};

/// Repository for model configuration.
pub struct ModelRepository;

/// Configuration of a model to create.
#[derive(Debug, Clone)]
pub struct NewModel {
    pub country_id: CountryId,
    pub forecast_type: ForecastType,
    pub display_type: DisplayType,
    pub params: ModelParams,
}

impl NewModel {
    pub fn new(country_id: CountryId, forecast_type: ForecastType) -> Self {
        Self {
            country_id,
            forecast_type,
            display_type: DisplayType::default(),
            params: ModelParams::default(),
        }
    }

    /// Set the display type.
    pub fn with_display_type(mut self, display_type: DisplayType) -> Self {
        self.display_type = display_type;
        self
    }

    /// Set the fitting parameters.
    pub fn with_params(mut self, params: ModelParams) -> Self {
        self.params = params;
        self
    }
}

impl ModelRepository {
    /// Create a country.
    pub async fn create_country(id: CountryId, iso_code: &str) -> Result<(), DbError> {
        let db = get_db()?;

        db.query(r#"CREATE type::thing("country", $id) SET iso_code = $iso_code"#)
            .bind(("id", id.0))
            .bind(("iso_code", iso_code.to_string()))
            .await?
            .check()?;

        Ok(())
    }

    /// Create a model.
    pub async fn create(id: ModelId, model: &NewModel) -> Result<(), DbError> {
        let db = get_db()?;
        let params = model.params.clone();

        db.query(
            r#"
            CREATE type::thing("model", $id) SET
                country = type::thing("country", $country_id),
                forecast_type = $forecast_type,
                display_type = $display_type,
                smoothing = $smoothing,
                rolling_sum_window = $rolling_sum_window,
                days_to_look_back = $days_to_look_back,
                num_change_points = $num_change_points,
                change_point_range = $change_point_range,
                seasonality_mode = $seasonality_mode,
                change_point_prior_scale = $change_point_prior_scale,
                holidays_prior_scale = $holidays_prior_scale,
                seasonality_prior_scale = $seasonality_prior_scale,
                add_country_holidays = $add_country_holidays
            "#,
        )
        .bind(("id", id.0))
        .bind(("country_id", model.country_id.0))
        .bind(("forecast_type", model.forecast_type))
        .bind(("display_type", model.display_type))
        .bind(("smoothing", params.smoothing))
        .bind(("rolling_sum_window", params.rolling_sum_window))
        .bind(("days_to_look_back", params.days_to_look_back))
        .bind(("num_change_points", params.num_change_points))
        .bind(("change_point_range", params.change_point_range))
        .bind(("seasonality_mode", params.seasonality_mode))
        .bind(("change_point_prior_scale", params.change_point_prior_scale))
        .bind(("holidays_prior_scale", params.holidays_prior_scale))
        .bind(("seasonality_prior_scale", params.seasonality_prior_scale))
        .bind(("add_country_holidays", params.add_country_holidays))
        .await?
        .check()?;

        tracing::debug!(model_id = %id, "model created");

        Ok(())
    }

    /// Attach a change point date to a model.
    pub async fn add_change_point(model_id: ModelId, date: NaiveDate) -> Result<(), DbError> {
        let db = get_db()?;

        db.query(r#"CREATE change_point SET model = type::thing("model", $model_id), date = $date"#)
            .bind(("model_id", model_id.0))
            .bind(("date", date.format("%Y-%m-%d").to_string()))
            .await?
            .check()?;

        Ok(())
    }
}
