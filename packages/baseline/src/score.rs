//! Rolling-origin cross-validation.
//!
//! The model is refitted on every prefix of the history that ends at a
//! cutoff and scored on the following fourteen days. Cutoffs are spaced so
//! that five or six simulated forecasts fit after the initial window.

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{FitError, FitOptions, TrendModel};
use crate::prepare::Observation;

pub const HORIZON_DAYS: f64 = 14.0;
pub const INITIAL_DAYS: f64 = 3.0 * HORIZON_DAYS;
const SIMULATED_FORECASTS: f64 = 5.0;
/// Share of horizon-sorted points averaged into the reported score.
const ROLLING_WINDOW: f64 = 0.1;
const EPSILON: f64 = 1e-9;

/// One held-out prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeldOut {
    pub date: NaiveDate,
    /// Days between cutoff and `date`.
    pub horizon_days: f64,
    pub actual: f64,
    pub predicted: f64,
}

/// Result of a cross-validation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossValidation {
    /// Cutoffs as fractional days after the first observation, ascending.
    pub cutoffs: Vec<f64>,
    pub held_out: Vec<HeldOut>,
    /// Mean absolute percentage error at the longest horizons.
    pub mape: f64,
}

fn day(origin: NaiveDate, date: NaiveDate) -> f64 {
    (date - origin).num_days() as f64
}

/// Cutoffs walking back from `horizon` before the end, one period at a time.
fn cutoffs(days: &[f64]) -> Result<Vec<f64>, FitError> {
    let (Some(&first), Some(&last)) = (days.first(), days.last()) else {
        return Err(FitError::InsufficientData);
    };

    let period = (last - first - HORIZON_DAYS - INITIAL_DAYS) / SIMULATED_FORECASTS;
    if !(period > 0.0) {
        return Err(FitError::InsufficientData);
    }

    // Multiples of the period from a base, so rounding does not accumulate.
    let mut base = last - HORIZON_DAYS;
    let mut steps = 0.0;
    let mut cutoff = base;
    let mut result = vec![cutoff];
    while cutoff >= first + INITIAL_DAYS - EPSILON {
        steps += 1.0;
        cutoff = base - steps * period;
        let covered = days
            .iter()
            .any(|d| *d > cutoff && *d <= cutoff + HORIZON_DAYS);
        if !covered {
            // Jump over the gap to the last observation before the cutoff.
            match days.iter().rev().find(|d| **d <= cutoff) {
                Some(closest) => {
                    base = closest - HORIZON_DAYS;
                    steps = 0.0;
                    cutoff = base;
                }
                None => break,
            }
        }
        result.push(cutoff);
    }
    result.pop();

    if result.is_empty() {
        return Err(FitError::InsufficientData);
    }
    result.reverse();
    Ok(result)
}

/// MAPE of the last rolling window of horizon-sorted points.
fn longest_horizon_mape(held_out: &[HeldOut]) -> Option<f64> {
    let mut errors: Vec<(f64, f64)> = held_out
        .iter()
        .filter(|p| p.actual != 0.0)
        .map(|p| (p.horizon_days, ((p.actual - p.predicted) / p.actual).abs()))
        .collect();
    if errors.is_empty() {
        return None;
    }
    errors.sort_by(|a, b| a.0.total_cmp(&b.0));

    let window = ((errors.len() as f64 * ROLLING_WINDOW) as usize).max(1);
    let tail = &errors[errors.len() - window..];
    Some(tail.iter().map(|(_, e)| e).sum::<f64>() / window as f64)
}

/// Cross-validate a model configuration on `observations`.
pub fn cross_validate(
    observations: &[Observation],
    options: &FitOptions<'_>,
) -> Result<CrossValidation, FitError> {
    let Some(origin) = observations.first().map(|o| o.date) else {
        return Err(FitError::InsufficientData);
    };
    let days: Vec<f64> = observations.iter().map(|o| day(origin, o.date)).collect();
    let cutoffs = cutoffs(&days)?;

    let mut held_out = Vec::new();
    for &cutoff in &cutoffs {
        let split = days.partition_point(|d| *d <= cutoff);
        let (train, rest) = observations.split_at(split);

        let model = match TrendModel::fit(train, options) {
            Ok(model) => model,
            Err(FitError::InsufficientData) => continue,
            Err(e) => return Err(e),
        };

        held_out.extend(
            rest.iter()
                .take_while(|o| day(origin, o.date) <= cutoff + HORIZON_DAYS)
                .map(|o| HeldOut {
                    date: o.date,
                    horizon_days: day(origin, o.date) - cutoff,
                    actual: o.value,
                    predicted: model.predict(o.date).point_estimate,
                }),
        );
    }

    let mape = longest_horizon_mape(&held_out).ok_or(FitError::InsufficientData)?;

    Ok(CrossValidation {
        cutoffs,
        held_out,
        mape,
    })
}
