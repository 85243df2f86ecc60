#![allow(dead_code)]

use std::sync::LazyLock;

use chrono::NaiveDate;
use forecast_core::{CountryId, ForecastType, ModelId};
use tokio::sync::{Mutex, MutexGuard};

use db::{
    DbConfig, DbError,
    repositories::{ModelRepository, NewModel},
};

static TEST_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn setup_db() -> Result<MutexGuard<'static, ()>, DbError> {
    let guard = TEST_LOCK.lock().await;
    db::init(DbConfig::memory()).await?;
    let db_conn = db::get_db()?;
    db_conn
        .query(
            "DELETE prediction; DELETE job; DELETE change_point; DELETE datapoint; \
             DELETE model; DELETE country;",
        )
        .await?
        .check()?;
    Ok(guard)
}

/// A country with one model of the given type.
pub async fn seed_model(
    country_id: i64,
    iso_code: &str,
    model_id: i64,
    forecast_type: ForecastType,
) -> Result<ModelId, DbError> {
    let country = CountryId(country_id);
    ModelRepository::create_country(country, iso_code).await?;
    let model = ModelId(model_id);
    ModelRepository::create(model, &NewModel::new(country, forecast_type)).await?;
    Ok(model)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}
