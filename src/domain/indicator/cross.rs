//! Boolean detectors built on indicator series.

use crate::domain::indicator::rolling::{rolling_mean, rolling_std};

/// True when `a` moved from at-or-below `b` on the previous bar to strictly above it.
/// Indeterminate inputs never cross.
pub fn crossed_above(
    prev_a: Option<f64>,
    prev_b: Option<f64>,
    a: Option<f64>,
    b: Option<f64>,
) -> bool {
    match (prev_a, prev_b, a, b) {
        (Some(pa), Some(pb), Some(a), Some(b)) => pa <= pb && a > b,
        _ => false,
    }
}

/// True when `a` moved from at-or-above `b` on the previous bar to strictly below it.
pub fn crossed_below(
    prev_a: Option<f64>,
    prev_b: Option<f64>,
    a: Option<f64>,
    b: Option<f64>,
) -> bool {
    match (prev_a, prev_b, a, b) {
        (Some(pa), Some(pb), Some(a), Some(b)) => pa >= pb && a < b,
        _ => false,
    }
}

/// Golden cross: true exactly at the bar where `short` goes from <= `long` to > `long`.
/// Staying above does not re-fire. Index 0 is always false.
pub fn golden_cross(short: &[f64], long: &[f64]) -> Vec<bool> {
    let n = short.len().min(long.len());
    (0..n)
        .map(|i| {
            i > 0
                && crossed_above(
                    Some(short[i - 1]),
                    Some(long[i - 1]),
                    Some(short[i]),
                    Some(long[i]),
                )
        })
        .collect()
}

pub const DEFAULT_SPIKE_WINDOW: usize = 20;
pub const DEFAULT_SPIKE_K: f64 = 2.0;

/// Volume spike: volume > rolling_mean(window) + k * rolling_std(window).
/// False until a full window is available.
pub fn volume_spike(volume: &[f64], window: usize, k: f64) -> Vec<bool> {
    let mean = rolling_mean(volume, window);
    let sd = rolling_std(volume, window);

    volume
        .iter()
        .zip(mean.iter().zip(sd.iter()))
        .map(|(v, (m, s))| match (m, s) {
            (Some(m), Some(s)) => *v > m + k * s,
            _ => false,
        })
        .collect()
}
