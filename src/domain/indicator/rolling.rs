//! Trailing-window statistics.
//!
//! Each function returns `None` until a full window of `n` points is available.
//! The standard deviation is the sample (n-1) estimator.

use crate::domain::indicator::PartialSeries;

fn windows<F>(values: &[f64], n: usize, f: F) -> PartialSeries
where
    F: Fn(&[f64]) -> f64,
{
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        if n == 0 || i + 1 < n {
            out.push(None);
        } else {
            out.push(Some(f(&values[i + 1 - n..=i])));
        }
    }
    out
}

pub fn rolling_mean(values: &[f64], n: usize) -> PartialSeries {
    windows(values, n, |w| w.iter().sum::<f64>() / w.len() as f64)
}

pub fn rolling_std(values: &[f64], n: usize) -> PartialSeries {
    if n < 2 {
        return vec![None; values.len()];
    }
    windows(values, n, |w| {
        let mean = w.iter().sum::<f64>() / w.len() as f64;
        let variance = w
            .iter()
            .map(|v| {
                let diff = v - mean;
                diff * diff
            })
            .sum::<f64>()
            / (w.len() - 1) as f64;
        variance.sqrt()
    })
}

pub fn rolling_max(values: &[f64], n: usize) -> PartialSeries {
    windows(values, n, |w| w.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

pub fn rolling_min(values: &[f64], n: usize) -> PartialSeries {
    windows(values, n, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}
