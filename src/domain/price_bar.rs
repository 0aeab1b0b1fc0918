//! Price bar representation.

/// One OHLCV bar, uniquely keyed by `(symbol, timeframe, timestamp)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub symbol: String,
    pub timeframe: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Column views over a bar slice, extracted once per evaluation.
#[derive(Debug, Clone, Default)]
pub struct BarColumns {
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl BarColumns {
    pub fn from_bars(bars: &[PriceBar]) -> Self {
        let mut cols = BarColumns {
            open: Vec::with_capacity(bars.len()),
            high: Vec::with_capacity(bars.len()),
            low: Vec::with_capacity(bars.len()),
            close: Vec::with_capacity(bars.len()),
            volume: Vec::with_capacity(bars.len()),
        };
        for bar in bars {
            cols.open.push(bar.open);
            cols.high.push(bar.high);
            cols.low.push(bar.low);
            cols.close.push(bar.close);
            cols.volume.push(bar.volume);
        }
        cols
    }

    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }
}

/// Sort bars chronologically and drop repeated timestamps, keeping the last one seen.
pub fn normalize_series(mut bars: Vec<PriceBar>) -> Vec<PriceBar> {
    bars.sort_by_key(|b| b.timestamp);
    let mut out: Vec<PriceBar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match out.last_mut() {
            Some(prev) if prev.timestamp == bar.timestamp => *prev = bar,
            _ => out.push(bar),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(ts: i64, open: f64, close: f64) -> PriceBar {
        PriceBar {
            symbol: "A005930".into(),
            timeframe: "1m".into(),
            timestamp: ts,
            open,
            high: open.max(close) + 1.0,
            low: open.min(close) - 1.0,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn columns_preserve_order() {
        let bars = vec![bar(1, 10.0, 11.0), bar(2, 11.0, 12.0)];
        let cols = BarColumns::from_bars(&bars);
        assert_eq!(cols.len(), 2);
        assert_eq!(cols.close, vec![11.0, 12.0]);
        assert_eq!(cols.open, vec![10.0, 11.0]);
    }

    #[test]
    fn normalize_sorts_and_dedups() {
        let bars = vec![bar(3, 1.0, 3.0), bar(1, 1.0, 1.0), bar(3, 1.0, 30.0), bar(2, 1.0, 2.0)];
        let out = normalize_series(bars);
        let ts: Vec<i64> = out.iter().map(|b| b.timestamp).collect();
        assert_eq!(ts, vec![1, 2, 3]);
        assert!((out[2].close - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn normalize_empty() {
        assert!(normalize_series(Vec::new()).is_empty());
    }
}
