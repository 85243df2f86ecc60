//! Database schema definitions using SurrealQL.

use crate::{DbError, get_db};

/// Initialize the database schema.
///
/// This creates all necessary tables, fields, and indexes.
pub async fn init_schema() -> Result<(), DbError> {
    let db = get_db()?;

    tracing::info!("Initializing database schema...");

    // Configuration tables (read-only for the scheduler)
    db.query(COUNTRY_SCHEMA).await?.check()?;
    db.query(MODEL_SCHEMA).await?.check()?;

    // Queue table
    db.query(JOB_SCHEMA).await?.check()?;

    // Output and input series
    db.query(PREDICTION_SCHEMA).await?.check()?;
    db.query(DATAPOINT_SCHEMA).await?.check()?;

    tracing::info!("Database schema initialized");

    Ok(())
}

/// Country table schema.
const COUNTRY_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS country SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS iso_code ON country TYPE string;

DEFINE INDEX IF NOT EXISTS country_iso ON country FIELDS iso_code UNIQUE;
"#;

/// Forecast model configuration and its change points.
const MODEL_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS model SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS country ON model TYPE record<country>;
DEFINE FIELD IF NOT EXISTS forecast_type ON model TYPE string
    ASSERT $value INSIDE ["cases", "deaths", "tests"];
DEFINE FIELD IF NOT EXISTS display_type ON model TYPE string DEFAULT "cumulative"
    ASSERT $value INSIDE ["daily", "cumulative"];
DEFINE FIELD IF NOT EXISTS smoothing ON model TYPE int DEFAULT 0
    ASSERT $value >= 0;
DEFINE FIELD IF NOT EXISTS rolling_sum_window ON model TYPE int DEFAULT 1
    ASSERT $value >= 0;
DEFINE FIELD IF NOT EXISTS days_to_look_back ON model TYPE int DEFAULT 90
    ASSERT $value >= 0;
DEFINE FIELD IF NOT EXISTS num_change_points ON model TYPE int DEFAULT 25
    ASSERT $value >= 0;
DEFINE FIELD IF NOT EXISTS change_point_range ON model TYPE float DEFAULT 0.8;
DEFINE FIELD IF NOT EXISTS seasonality_mode ON model TYPE string DEFAULT "additive"
    ASSERT $value INSIDE ["additive", "multiplicative"];
DEFINE FIELD IF NOT EXISTS change_point_prior_scale ON model TYPE float DEFAULT 0.05;
DEFINE FIELD IF NOT EXISTS holidays_prior_scale ON model TYPE float DEFAULT 10.0;
DEFINE FIELD IF NOT EXISTS seasonality_prior_scale ON model TYPE float DEFAULT 10.0;
DEFINE FIELD IF NOT EXISTS add_country_holidays ON model TYPE bool DEFAULT false;

DEFINE TABLE IF NOT EXISTS change_point SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS model ON change_point TYPE record<model>;
DEFINE FIELD IF NOT EXISTS date ON change_point TYPE string;

DEFINE INDEX IF NOT EXISTS change_point_model ON change_point FIELDS model;
"#;

/// Job table schema.
const JOB_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS job SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS model ON job TYPE record<model>;
DEFINE FIELD IF NOT EXISTS status ON job TYPE string DEFAULT "IN_QUEUE"
    ASSERT $value INSIDE ["IN_QUEUE", "PROCESSING", "DONE", "FAILED"];
DEFINE FIELD IF NOT EXISTS with_score ON job TYPE bool DEFAULT false;
DEFINE FIELD IF NOT EXISTS score ON job TYPE option<float>;
DEFINE FIELD IF NOT EXISTS started_at ON job TYPE option<datetime>;
DEFINE FIELD IF NOT EXISTS finished_at ON job TYPE option<datetime>;
DEFINE FIELD IF NOT EXISTS error_reason ON job TYPE option<string>;
DEFINE FIELD IF NOT EXISTS created_at ON job TYPE datetime DEFAULT time::now();

-- Pending scan and stale-claim lookups
DEFINE INDEX IF NOT EXISTS job_status ON job FIELDS status;
DEFINE INDEX IF NOT EXISTS job_model ON job FIELDS model;
"#;

/// Prediction table, fully replaced per model on every successful run.
const PREDICTION_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS prediction SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS model ON prediction TYPE record<model>;
DEFINE FIELD IF NOT EXISTS date ON prediction TYPE string;
DEFINE FIELD IF NOT EXISTS upper_bound ON prediction TYPE float;
DEFINE FIELD IF NOT EXISTS point_estimate ON prediction TYPE float;
DEFINE FIELD IF NOT EXISTS lower_bound ON prediction TYPE float;
DEFINE FIELD IF NOT EXISTS is_change_point ON prediction TYPE bool DEFAULT false;

DEFINE INDEX IF NOT EXISTS prediction_model ON prediction FIELDS model;
"#;

/// Observed series the forecasts are fitted on.
const DATAPOINT_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS datapoint SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS country ON datapoint TYPE record<country>;
DEFINE FIELD IF NOT EXISTS date ON datapoint TYPE string;
DEFINE FIELD IF NOT EXISTS main_region ON datapoint TYPE bool DEFAULT true;
DEFINE FIELD IF NOT EXISTS cases ON datapoint TYPE option<float>;
DEFINE FIELD IF NOT EXISTS deaths ON datapoint TYPE option<float>;
DEFINE FIELD IF NOT EXISTS tests ON datapoint TYPE option<float>;

DEFINE INDEX IF NOT EXISTS datapoint_country_date ON datapoint FIELDS country, date;
"#;
