//! RSI (Relative Strength Index).
//!
//! Gains and losses are the positive and negative close-to-close deltas; the
//! first bar contributes a zero delta. Both are averaged over a trailing window
//! of `period` points:
//!
//! RS = avg_gain / (avg_loss + 1e-9), RSI = 100 - 100 / (1 + RS)
//!
//! Warmup: the first (period-1) points are indeterminate.

use crate::domain::indicator::rolling::rolling_mean;
use crate::domain::indicator::PartialSeries;

pub const DEFAULT_RSI_PERIOD: usize = 14;

const EPSILON: f64 = 1e-9;

pub fn rsi(close: &[f64], period: usize) -> PartialSeries {
    let mut gains = Vec::with_capacity(close.len());
    let mut losses = Vec::with_capacity(close.len());

    for i in 0..close.len() {
        let delta = if i == 0 { 0.0 } else { close[i] - close[i - 1] };
        gains.push(if delta > 0.0 { delta } else { 0.0 });
        losses.push(if delta < 0.0 { -delta } else { 0.0 });
    }

    let avg_gain = rolling_mean(&gains, period);
    let avg_loss = rolling_mean(&losses, period);

    avg_gain
        .iter()
        .zip(avg_loss.iter())
        .map(|(g, l)| match (g, l) {
            (Some(g), Some(l)) => {
                let rs = g / (l + EPSILON);
                Some((100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0))
            }
            _ => None,
        })
        .collect()
}
