//! Forecast model configuration types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a forecast model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(pub i64);

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a country.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountryId(pub i64);

impl std::fmt::Display for CountryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a stored enum value is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Which observed quantity a model forecasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastType {
    #[serde(alias = "CASES")]
    Cases,
    #[serde(alias = "DEATHS")]
    Deaths,
    #[serde(alias = "TESTS")]
    Tests,
}

impl ForecastType {
    /// The datapoint column holding this quantity.
    ///
    /// Queries select the series through this fixed mapping only.
    pub fn column(&self) -> &'static str {
        match self {
            ForecastType::Cases => "cases",
            ForecastType::Deaths => "deaths",
            ForecastType::Tests => "tests",
        }
    }
}

impl std::fmt::Display for ForecastType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

impl std::str::FromStr for ForecastType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cases" => Ok(ForecastType::Cases),
            "deaths" => Ok(ForecastType::Deaths),
            "tests" => Ok(ForecastType::Tests),
            _ => Err(ParseEnumError::new("forecast type", s)),
        }
    }
}

/// How the stored cumulative series is presented to the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayType {
    /// Day-over-day differences of the cumulative series.
    Daily,
    /// The cumulative series as stored.
    #[default]
    Cumulative,
}

impl std::str::FromStr for DisplayType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(DisplayType::Daily),
            "cumulative" => Ok(DisplayType::Cumulative),
            _ => Err(ParseEnumError::new("display type", s)),
        }
    }
}

/// How seasonal effects combine with the trend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalityMode {
    #[default]
    Additive,
    Multiplicative,
}

impl std::str::FromStr for SeasonalityMode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "additive" => Ok(SeasonalityMode::Additive),
            "multiplicative" => Ok(SeasonalityMode::Multiplicative),
            _ => Err(ParseEnumError::new("seasonality mode", s)),
        }
    }
}

/// Tunable fitting parameters copied from the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    /// Rolling-mean window; zero disables smoothing.
    pub smoothing: u32,
    /// Rolling-sum window; values up to one disable it.
    pub rolling_sum_window: u32,
    /// How many days of history to fit on.
    pub days_to_look_back: u32,
    /// Number of automatically placed change points.
    pub num_change_points: u32,
    /// Fraction of the history in which change points may be placed.
    pub change_point_range: f64,
    pub seasonality_mode: SeasonalityMode,
    pub change_point_prior_scale: f64,
    pub holidays_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    pub add_country_holidays: bool,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            smoothing: 0,
            rolling_sum_window: 1,
            days_to_look_back: 90,
            num_change_points: 25,
            change_point_range: 0.8,
            seasonality_mode: SeasonalityMode::Additive,
            change_point_prior_scale: 0.05,
            holidays_prior_scale: 10.0,
            seasonality_prior_scale: 10.0,
            add_country_holidays: false,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[test]
    fn forecast_type_maps_to_fixed_columns() {
        assert_eq!(ForecastType::Cases.column(), "cases");
        assert_eq!(ForecastType::Deaths.column(), "deaths");
        assert_eq!(ForecastType::Tests.column(), "tests");
        assert_eq!("DEATHS".parse::<ForecastType>().unwrap(), ForecastType::Deaths);
        assert!("cases; DELETE job".parse::<ForecastType>().is_err());
    }

    #[test]
    fn display_and_seasonality_reject_unknown_text() {
        assert_eq!("Daily".parse::<DisplayType>().unwrap(), DisplayType::Daily);
        assert_eq!(
            "multiplicative".parse::<SeasonalityMode>().unwrap(),
            SeasonalityMode::Multiplicative
        );
        assert!("weekly".parse::<DisplayType>().is_err());
        assert!("additve".parse::<SeasonalityMode>().is_err());
    }

    #[test]
    fn forecast_type_accepts_upper_case_on_the_wire() {
        let parsed: ForecastType = serde_json::from_str("\"TESTS\"").unwrap();
        assert_eq!(parsed, ForecastType::Tests);
    }
}
