//! Piecewise-linear trend with weekly seasonality and holiday effects.
//!
//! The trend bends at a set of hinge dates; slope changes are ridge
//! penalised according to the change-point prior, so a small prior keeps
//! the trend close to a straight line. Seasonal and holiday coefficients are
//! fitted freely and then shrunk by `s / (s + 1)` where `s` is their prior
//! scale. All predictions are clamped to `[0, cap]`.

use std::f64::consts::TAU;

use chrono::{Datelike, NaiveDate};
use forecast_core::{ModelParams, PredictionPoint, SeasonalityMode};

use crate::holidays::HolidayCalendar;
use crate::linalg::ridge;
use crate::prepare::Observation;

/// Fewest defined observations a fit accepts.
pub const MIN_OBSERVATIONS: usize = 3;

/// Two-sided 80 % normal quantile.
const Z_80: f64 = 1.281_551_565_5;
/// History must span this many days before weekly seasonality is fitted.
const WEEKLY_MIN_SPAN_DAYS: i64 = 14;
const WEEKLY_ORDER: usize = 3;
/// Slope-change penalty is `RIDGE_SCALE / prior²`.
const RIDGE_SCALE: f64 = 1e-3;
/// Keeps the normal equations well conditioned.
const JITTER: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    #[error("insufficient data")]
    InsufficientData,
    #[error("model fit failed: singular design matrix")]
    Singular,
}

/// What a fit needs besides the observations.
#[derive(Debug, Clone, Copy)]
pub struct FitOptions<'a> {
    pub params: &'a ModelParams,
    /// Supplied hinge dates; empty selects them automatically.
    pub change_points: &'a [NaiveDate],
    pub holidays: Option<&'a HolidayCalendar>,
    pub cap: f64,
}

/// A fitted model.
#[derive(Debug, Clone)]
pub struct TrendModel {
    origin: NaiveDate,
    last: NaiveDate,
    span_days: f64,
    scale: f64,
    mode: SeasonalityMode,
    change_points: Vec<NaiveDate>,
    hinges: Vec<f64>,
    trend: Vec<f64>,
    weekly: Vec<f64>,
    holidays: Option<HolidayCalendar>,
    holiday_effect: f64,
    sigma: f64,
    cap: f64,
}

fn shrink(prior_scale: f64) -> f64 {
    if prior_scale > 0.0 && prior_scale.is_finite() {
        prior_scale / (prior_scale + 1.0)
    } else {
        0.0
    }
}

fn hinge_penalty(prior_scale: f64) -> f64 {
    if prior_scale > 0.0 && prior_scale.is_finite() {
        RIDGE_SCALE / (prior_scale * prior_scale)
    } else {
        1e12
    }
}

fn fourier(date: NaiveDate) -> [f64; 2 * WEEKLY_ORDER] {
    let phase = f64::from(date.num_days_from_ce()) / 7.0;
    let mut terms = [0.0; 2 * WEEKLY_ORDER];
    for k in 0..WEEKLY_ORDER {
        let angle = TAU * (k + 1) as f64 * phase;
        terms[2 * k] = angle.sin();
        terms[2 * k + 1] = angle.cos();
    }
    terms
}

/// Evenly spaced hinges over the first `range` of the history.
fn automatic_change_points(
    observations: &[Observation],
    count: u32,
    range: f64,
) -> Vec<NaiveDate> {
    let hist_size = (observations.len() as f64 * range.clamp(0.0, 1.0)).floor() as usize;
    let count = (count as usize).min(hist_size.saturating_sub(1));
    if count == 0 {
        return Vec::new();
    }

    let step = (hist_size - 1) as f64 / count as f64;
    let mut dates: Vec<NaiveDate> = (1..=count)
        .map(|i| observations[(i as f64 * step).round_ties_even() as usize].date)
        .collect();
    dates.dedup();
    dates
}

impl TrendModel {
    pub fn fit(observations: &[Observation], options: &FitOptions<'_>) -> Result<Self, FitError> {
        if observations.len() < MIN_OBSERVATIONS {
            return Err(FitError::InsufficientData);
        }

        let params = options.params;
        let origin = observations[0].date;
        let last = observations[observations.len() - 1].date;
        let span = (last - origin).num_days();

        let scale = observations
            .iter()
            .map(|o| o.value.abs())
            .fold(0.0, f64::max);
        let scale = if scale > 0.0 { scale } else { 1.0 };

        let change_points = if options.change_points.is_empty() {
            automatic_change_points(observations, params.num_change_points, params.change_point_range)
        } else {
            options
                .change_points
                .iter()
                .copied()
                .filter(|d| *d > origin && *d < last)
                .collect()
        };

        let holidays = options
            .holidays
            .filter(|calendar| {
                let hits = observations
                    .iter()
                    .filter(|o| calendar.is_holiday(o.date))
                    .count();
                hits > 0 && hits < observations.len()
            })
            .copied();

        let mut model = Self {
            origin,
            last,
            span_days: span.max(1) as f64,
            scale,
            mode: params.seasonality_mode,
            hinges: Vec::new(),
            change_points,
            trend: Vec::new(),
            weekly: Vec::new(),
            holidays,
            holiday_effect: 0.0,
            sigma: 0.0,
            cap: options.cap,
        };
        model.hinges = model
            .change_points
            .iter()
            .map(|d| model.time(*d))
            .collect();

        let weekly = span >= WEEKLY_MIN_SPAN_DAYS;
        let y: Vec<f64> = observations.iter().map(|o| o.value / scale).collect();
        let trend_penalty = model.trend_penalty(params);

        match model.mode {
            SeasonalityMode::Additive => {
                let rows: Vec<Vec<f64>> = observations
                    .iter()
                    .map(|o| {
                        let mut row = model.trend_row(o.date);
                        row.extend(model.seasonal_row(o.date, weekly));
                        row
                    })
                    .collect();
                let mut penalty = trend_penalty;
                penalty.resize(rows[0].len(), JITTER);

                let beta = ridge(&rows, &y, &penalty).ok_or(FitError::Singular)?;
                model.set_seasonal(&beta[model.trend_len()..], weekly, params);
                model.trend = beta[..model.trend_len()].to_vec();
            }
            SeasonalityMode::Multiplicative => {
                let rows: Vec<Vec<f64>> =
                    observations.iter().map(|o| model.trend_row(o.date)).collect();
                model.trend = ridge(&rows, &y, &trend_penalty).ok_or(FitError::Singular)?;

                if weekly || model.holidays.is_some() {
                    let (rows, ratios): (Vec<Vec<f64>>, Vec<f64>) = observations
                        .iter()
                        .zip(&y)
                        .filter_map(|(o, value)| {
                            let trend = model.trend_at(model.time(o.date));
                            (trend.abs() > 1e-6)
                                .then(|| (model.seasonal_row(o.date, weekly), value / trend - 1.0))
                        })
                        .unzip();
                    let columns = model.seasonal_row(origin, weekly).len();

                    // A vanishing trend leaves nothing to scale; keep the trend alone.
                    if rows.len() > columns
                        && let Some(beta) = ridge(&rows, &ratios, &vec![JITTER; columns])
                    {
                        model.set_seasonal(&beta, weekly, params);
                    }
                }
            }
        }

        let sse: f64 = observations
            .iter()
            .map(|o| (o.value - model.raw_estimate(o.date)).powi(2))
            .sum();
        let dof = observations.len().saturating_sub(2).max(1);
        model.sigma = (sse / dof as f64).sqrt();

        Ok(model)
    }

    /// Hinge dates the trend may bend at.
    pub fn change_points(&self) -> &[NaiveDate] {
        &self.change_points
    }

    pub fn residual_std(&self) -> f64 {
        self.sigma
    }

    /// Prediction with 80 % interval for `date`.
    pub fn predict(&self, date: NaiveDate) -> PredictionPoint {
        let estimate = self.raw_estimate(date);
        let ahead = (date - self.last).num_days().max(0) as f64;
        let half_width = Z_80 * self.sigma * (1.0 + ahead / 7.0).sqrt();

        PredictionPoint::new(
            date,
            self.clamp(estimate),
            self.clamp(estimate - half_width),
            self.clamp(estimate + half_width),
        )
    }

    pub fn predict_all(&self, dates: impl IntoIterator<Item = NaiveDate>) -> Vec<PredictionPoint> {
        dates.into_iter().map(|date| self.predict(date)).collect()
    }

    fn clamp(&self, value: f64) -> f64 {
        value.min(self.cap).max(0.0)
    }

    fn time(&self, date: NaiveDate) -> f64 {
        (date - self.origin).num_days() as f64 / self.span_days
    }

    fn trend_len(&self) -> usize {
        2 + self.hinges.len()
    }

    fn trend_penalty(&self, params: &ModelParams) -> Vec<f64> {
        let mut penalty = vec![JITTER, JITTER];
        penalty.extend(
            std::iter::repeat(hinge_penalty(params.change_point_prior_scale))
                .take(self.hinges.len()),
        );
        penalty
    }

    fn trend_row(&self, date: NaiveDate) -> Vec<f64> {
        let t = self.time(date);
        let mut row = Vec::with_capacity(self.trend_len());
        row.push(1.0);
        row.push(t);
        row.extend(self.hinges.iter().map(|s| (t - s).max(0.0)));
        row
    }

    fn seasonal_row(&self, date: NaiveDate, weekly: bool) -> Vec<f64> {
        let mut row = Vec::new();
        if weekly {
            row.extend(fourier(date));
        }
        if let Some(calendar) = &self.holidays {
            row.push(if calendar.is_holiday(date) { 1.0 } else { 0.0 });
        }
        row
    }

    fn set_seasonal(&mut self, beta: &[f64], weekly: bool, params: &ModelParams) {
        let (weekly_beta, rest) = if weekly {
            beta.split_at(2 * WEEKLY_ORDER)
        } else {
            beta.split_at(0)
        };
        let seasonal_shrink = shrink(params.seasonality_prior_scale);
        self.weekly = weekly_beta.iter().map(|b| b * seasonal_shrink).collect();
        if self.holidays.is_some()
            && let Some(effect) = rest.first()
        {
            self.holiday_effect = effect * shrink(params.holidays_prior_scale);
        }
    }

    /// Trend in scaled units.
    fn trend_at(&self, t: f64) -> f64 {
        let Some((base, deltas)) = self.trend.split_first_chunk::<2>() else {
            return 0.0;
        };
        base[0]
            + base[1] * t
            + deltas
                .iter()
                .zip(&self.hinges)
                .map(|(delta, s)| delta * (t - s).max(0.0))
                .sum::<f64>()
    }

    /// Seasonal plus holiday component, in scaled units (additive) or as a
    /// relative factor (multiplicative).
    fn seasonal_at(&self, date: NaiveDate) -> f64 {
        let weekly: f64 = if self.weekly.is_empty() {
            0.0
        } else {
            fourier(date)
                .iter()
                .zip(&self.weekly)
                .map(|(x, b)| x * b)
                .sum()
        };
        let holiday = match &self.holidays {
            Some(calendar) if calendar.is_holiday(date) => self.holiday_effect,
            _ => 0.0,
        };
        weekly + holiday
    }

    /// Unclamped point estimate in original units.
    fn raw_estimate(&self, date: NaiveDate) -> f64 {
        let trend = self.trend_at(self.time(date));
        let seasonal = self.seasonal_at(date);
        let scaled = match self.mode {
            SeasonalityMode::Additive => trend + seasonal,
            SeasonalityMode::Multiplicative => trend * (1.0 + seasonal),
        };
        scaled * self.scale
    }
}
