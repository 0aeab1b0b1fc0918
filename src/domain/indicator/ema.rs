//! Exponential Moving Average.
//!
//! alpha = 2/(span+1), EMA[0] = values[0], EMA[i] = values[i]*alpha + EMA[i-1]*(1-alpha).
//! Seeded by the first value, so every point is defined.

pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    if span == 0 || values.is_empty() {
        return Vec::new();
    }

    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev = values[0];
    out.push(prev);

    for &v in &values[1..] {
        prev = v * alpha + prev * (1.0 - alpha);
        out.push(prev);
    }

    out
}
