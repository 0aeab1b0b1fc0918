//! MACD (Moving Average Convergence Divergence).
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9. The EMAs are seeded by their
//! first value, so there is no warmup.

use crate::domain::indicator::ema;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Macd {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl Macd {
    pub fn len(&self) -> usize {
        self.line.len()
    }

    pub fn is_empty(&self) -> bool {
        self.line.is_empty()
    }
}

pub fn macd(close: &[f64], fast: usize, slow: usize, signal_span: usize) -> Macd {
    if close.is_empty() || fast == 0 || slow == 0 || signal_span == 0 {
        return Macd::default();
    }

    let ema_fast = ema(close, fast);
    let ema_slow = ema(close, slow);

    let line: Vec<f64> = ema_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| f - s)
        .collect();
    let signal = ema(&line, signal_span);
    let histogram = line.iter().zip(signal.iter()).map(|(l, s)| l - s).collect();

    Macd {
        line,
        signal,
        histogram,
    }
}

pub fn macd_default(close: &[f64]) -> Macd {
    macd(close, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}
