//! Technical indicator library.
//!
//! Pure transforms over numeric series. Inputs are never mutated and every
//! function is total: empty input yields empty output, and points that a
//! trailing window cannot determine yet are `None` rather than NaN.
//!
//! - [`sma`]: simple moving average, partial windows at the start
//! - [`ema`]: exponential moving average seeded by the first value
//! - [`rsi`]: relative strength index over rolling means
//! - [`macd`]: MACD line, signal line and histogram
//! - [`obv`]: on-balance volume
//! - [`golden_cross`] / [`volume_spike`]: boolean detectors
//! - [`rolling`]: trailing-window mean, sample stddev, max and min

pub mod cross;
pub mod ema;
pub mod macd;
pub mod obv;
pub mod rolling;
pub mod rsi;
pub mod sma;

pub use cross::{crossed_above, crossed_below, golden_cross, volume_spike};
pub use ema::ema;
pub use macd::{macd, macd_default, Macd};
pub use obv::obv;
pub use rsi::{rsi, DEFAULT_RSI_PERIOD};
pub use sma::sma;

/// An indicator series whose leading points may be indeterminate.
pub type PartialSeries = Vec<Option<f64>>;

/// First difference: `out[i] = values[i] - values[i-1]`, `None` at index 0.
pub fn diff(values: &[f64]) -> PartialSeries {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        if i == 0 {
            out.push(None);
        } else {
            out.push(Some(values[i] - values[i - 1]));
        }
    }
    out
}

/// First difference over a partial series; `None` wherever either side is `None`.
pub fn diff_partial(values: &[Option<f64>]) -> PartialSeries {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        let d = match (i.checked_sub(1).and_then(|p| values[p]), values[i]) {
            (Some(prev), Some(curr)) => Some(curr - prev),
            _ => None,
        };
        out.push(d);
    }
    out
}

/// Shift a series forward by one bar: `out[i] = values[i-1]`, `None` at index 0.
pub fn lag(values: &[Option<f64>]) -> PartialSeries {
    let mut out = Vec::with_capacity(values.len());
    if values.is_empty() {
        return out;
    }
    out.push(None);
    out.extend_from_slice(&values[..values.len() - 1]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_first_point_indeterminate() {
        let d = diff(&[1.0, 3.0, 2.0]);
        assert_eq!(d, vec![None, Some(2.0), Some(-1.0)]);
    }

    #[test]
    fn diff_partial_propagates_gaps() {
        let d = diff_partial(&[None, Some(1.0), Some(4.0)]);
        assert_eq!(d, vec![None, None, Some(3.0)]);
    }

    #[test]
    fn lag_shifts_by_one() {
        assert_eq!(lag(&[Some(1.0), Some(2.0)]), vec![None, Some(1.0)]);
        assert!(lag(&[]).is_empty());
    }
}
