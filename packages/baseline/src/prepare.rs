//! Turning the raw observation series into the values the model is fitted on.
//!
//! Each step works on row positions, not calendar days, and any window that
//! touches an undefined value is itself undefined. Undefined rows keep their
//! date so predictions still cover them.

use chrono::NaiveDate;
use db::repositories::SeriesPoint;
use forecast_core::{DisplayType, ModelParams};

/// Capacity is this multiple of the largest prepared value.
const CAP_FACTOR: f64 = 10.0;

/// One defined value the model is fitted on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

/// Output of [`prepare`].
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSeries {
    /// Every date of the input, defined or not.
    pub dates: Vec<NaiveDate>,
    /// Rows with a defined value after all transformations.
    pub observations: Vec<Observation>,
    /// Upper clamp for predictions; `None` when nothing is defined.
    pub cap: Option<f64>,
}

/// Apply display conversion, smoothing and rolling sum, then drop undefined rows.
pub fn prepare(series: &[SeriesPoint], display: DisplayType, params: &ModelParams) -> PreparedSeries {
    let mut values: Vec<Option<f64>> = series
        .iter()
        .map(|p| p.value.filter(|v| v.is_finite()))
        .collect();

    if display == DisplayType::Daily {
        values = diff(&values);
    }
    if params.smoothing > 0 {
        values = rolling(&values, params.smoothing as usize, |window| {
            window.iter().sum::<f64>() / window.len() as f64
        });
    }
    if params.rolling_sum_window > 1 {
        values = rolling(&values, params.rolling_sum_window as usize, |window| {
            window.iter().sum()
        });
    }

    let observations: Vec<Observation> = series
        .iter()
        .zip(&values)
        .filter_map(|(point, value)| {
            value.map(|value| Observation {
                date: point.date,
                value,
            })
        })
        .collect();

    let cap = observations
        .iter()
        .map(|o| o.value)
        .reduce(f64::max)
        .map(|max| (max * CAP_FACTOR).round_ties_even());

    PreparedSeries {
        dates: series.iter().map(|p| p.date).collect(),
        observations,
        cap,
    }
}

/// Difference to the previous row. The first row is undefined.
fn diff(values: &[Option<f64>]) -> Vec<Option<f64>> {
    std::iter::once(None)
        .chain(
            values
                .windows(2)
                .map(|pair| Some(pair[1]? - pair[0]?)),
        )
        .take(values.len())
        .collect()
}

/// Trailing window of `size` rows; defined only when every row in it is.
fn rolling(
    values: &[Option<f64>],
    size: usize,
    reduce: impl Fn(&[f64]) -> f64,
) -> Vec<Option<f64>> {
    let mut buffer = Vec::with_capacity(size);
    (0..values.len())
        .map(|end| {
            if end + 1 < size {
                return None;
            }
            buffer.clear();
            for value in &values[end + 1 - size..=end] {
                buffer.push((*value)?);
            }
            Some(reduce(&buffer))
        })
        .collect()
}
