//! Forecast output types.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One predicted value with its uncertainty interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionPoint {
    pub date: NaiveDate,
    pub point_estimate: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    #[serde(default)]
    pub is_change_point: bool,
}

impl PredictionPoint {
    pub fn new(date: NaiveDate, point_estimate: f64, lower_bound: f64, upper_bound: f64) -> Self {
        Self {
            date,
            point_estimate,
            lower_bound,
            upper_bound,
            is_change_point: false,
        }
    }
}

/// What a forecast backend returns for a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutput {
    /// Predictions over history and horizon, ordered by date.
    pub predictions: Vec<PredictionPoint>,
    /// Dates at which the fitted trend was allowed to change slope.
    #[serde(default)]
    pub change_points: BTreeSet<NaiveDate>,
    /// Accuracy score, present only when scoring was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl ForecastOutput {
    pub fn new(predictions: Vec<PredictionPoint>) -> Self {
        Self {
            predictions,
            ..Default::default()
        }
    }

    pub fn with_change_points(mut self, change_points: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.change_points = change_points.into_iter().collect();
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Consume the output, flagging every prediction that falls on a change point.
    pub fn into_points(self) -> Vec<PredictionPoint> {
        let change_points = self.change_points;
        self.predictions
            .into_iter()
            .map(|mut point| {
                point.is_change_point = change_points.contains(&point.date);
                point
            })
            .collect()
    }
}
