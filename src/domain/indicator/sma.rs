//! Simple Moving Average.
//!
//! SMA(n)[i] = mean(values[max(0, i-n+1)..=i]).
//! No warmup: the first (n-1) points average every point available so far.

pub fn sma(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;

    for (i, &v) in values.iter().enumerate() {
        sum += v;
        if i >= window {
            sum -= values[i - window];
        }
        let count = (i + 1).min(window);
        out.push(sum / count as f64);
    }

    out
}
