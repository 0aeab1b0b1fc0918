//! Named boolean conditions over a price series, and presets that AND them.
//!
//! The registry is closed: every rule name maps to a [`Condition`] variant, and
//! names that are not recognised resolve to [`Condition::NoOp`], which is never
//! true. Every condition takes a chronologically sorted, deduplicated series and
//! returns a signal aligned 1:1 with it. Points a trailing window cannot decide
//! yet are `false`.

use std::fmt;
use std::str::FromStr;

use crate::domain::indicator::rolling::{rolling_max, rolling_mean, rolling_min};
use crate::domain::indicator::{
    crossed_above, crossed_below, diff, diff_partial, ema, golden_cross, lag, macd_default, obv,
    rsi, sma, volume_spike, DEFAULT_RSI_PERIOD,
};
use crate::domain::price_bar::{BarColumns, PriceBar};
use crate::ports::price_port::PricePort;

/// Bars in one regular session of one-minute data; the "previous day" lookback.
const SESSION_BARS: usize = 390;
const ATR_WINDOW: usize = 14;
const LONG_CANDLE_ATR_MULT: f64 = 1.5;
const GAP_UP_MIN_PCT: f64 = 1.0;
const RSI_OVERSOLD: f64 = 30.0;
const RSI_OVERBOUGHT: f64 = 70.0;
const FIB_LOOKBACK: usize = 20;
const FIB_LOWER: f64 = 0.382;
const FIB_UPPER: f64 = 0.618;
const MA_SUPPORT_TOLERANCE: f64 = 0.995;
const PSYCH_STEP: f64 = 1000.0;
const PSYCH_BAND: f64 = 0.002;
const ZERO_GUARD: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    VolumeSpike,
    ShortMaGoldenCross,
    LongBullishCandle,
    PrevHighBreakout,
    PrevLowSupport,
    GapUpSupport,
    RsiOversoldBounce,
    RsiOverbought,
    MacdGoldenCross,
    MacdDeadCross,
    ObvRising,
    ObvFalling,
    PullbackBounce,
    LowerHighPattern,
    FibonacciRetracement,
    MaSupport,
    ThemeSurge,
    AskWallCleared,
    DowntrendBreakout,
    PsychologicalLevel,
    DayMaCross,
    MidTrend,
    /// Unrecognised rule name. Always false and never counted by the scorer.
    NoOp,
}

impl Condition {
    pub const ALL: [Condition; 22] = [
        Condition::VolumeSpike,
        Condition::ShortMaGoldenCross,
        Condition::LongBullishCandle,
        Condition::PrevHighBreakout,
        Condition::PrevLowSupport,
        Condition::GapUpSupport,
        Condition::RsiOversoldBounce,
        Condition::RsiOverbought,
        Condition::MacdGoldenCross,
        Condition::MacdDeadCross,
        Condition::ObvRising,
        Condition::ObvFalling,
        Condition::PullbackBounce,
        Condition::LowerHighPattern,
        Condition::FibonacciRetracement,
        Condition::MaSupport,
        Condition::ThemeSurge,
        Condition::AskWallCleared,
        Condition::DowntrendBreakout,
        Condition::PsychologicalLevel,
        Condition::DayMaCross,
        Condition::MidTrend,
    ];

    /// Registry key used in rule configuration.
    pub fn name(&self) -> &'static str {
        match self {
            Condition::VolumeSpike => "volume_spike",
            Condition::ShortMaGoldenCross => "short_ma_golden_cross",
            Condition::LongBullishCandle => "long_bullish_candle",
            Condition::PrevHighBreakout => "prev_high_breakout",
            Condition::PrevLowSupport => "prev_low_support",
            Condition::GapUpSupport => "gap_up_support",
            Condition::RsiOversoldBounce => "rsi_oversold_bounce",
            Condition::RsiOverbought => "rsi_overbought",
            Condition::MacdGoldenCross => "macd_golden_cross",
            Condition::MacdDeadCross => "macd_dead_cross",
            Condition::ObvRising => "obv_rising",
            Condition::ObvFalling => "obv_falling",
            Condition::PullbackBounce => "pullback_bounce",
            Condition::LowerHighPattern => "lower_high_pattern",
            Condition::FibonacciRetracement => "fibonacci_retracement",
            Condition::MaSupport => "ma_support",
            Condition::ThemeSurge => "theme_surge",
            Condition::AskWallCleared => "ask_wall_cleared",
            Condition::DowntrendBreakout => "downtrend_breakout",
            Condition::PsychologicalLevel => "psychological_level",
            Condition::DayMaCross => "day_ma_cross",
            Condition::MidTrend => "mid_trend",
            Condition::NoOp => "noop",
        }
    }

    /// Resolve a rule name. Case, surrounding whitespace, spaces and hyphens are
    /// ignored; anything unrecognised is [`Condition::NoOp`].
    pub fn lookup(name: &str) -> Condition {
        let key: String = name
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();
        Condition::ALL
            .iter()
            .copied()
            .find(|c| c.name() == key)
            .unwrap_or(Condition::NoOp)
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Condition::NoOp)
    }

    pub fn evaluate(&self, bars: &[PriceBar]) -> Vec<bool> {
        self.evaluate_columns(&BarColumns::from_bars(bars))
    }

    pub fn evaluate_columns(&self, cols: &BarColumns) -> Vec<bool> {
        let n = cols.len();
        match self {
            Condition::VolumeSpike | Condition::ThemeSurge => volume_spike(&cols.volume, 20, 2.0),
            Condition::ShortMaGoldenCross => {
                golden_cross(&ema(&cols.close, 5), &ema(&cols.close, 20))
            }
            Condition::LongBullishCandle => {
                let ranges: Vec<f64> = cols
                    .high
                    .iter()
                    .zip(cols.low.iter())
                    .map(|(h, l)| h - l)
                    .collect();
                let atr = rolling_mean(&ranges, ATR_WINDOW);
                (0..n)
                    .map(|i| {
                        let body = (cols.close[i] - cols.open[i]).abs();
                        cols.close[i] > cols.open[i]
                            && atr[i].is_some_and(|a| body > LONG_CANDLE_ATR_MULT * a)
                    })
                    .collect()
            }
            Condition::PrevHighBreakout => {
                let prior = lag(&rolling_max(&cols.high, SESSION_BARS));
                (0..n)
                    .map(|i| prior[i].is_some_and(|h| cols.high[i] > h))
                    .collect()
            }
            Condition::PrevLowSupport => {
                let prior = lag(&rolling_min(&cols.low, SESSION_BARS));
                (0..n)
                    .map(|i| prior[i].is_some_and(|l| cols.low[i] >= l))
                    .collect()
            }
            Condition::GapUpSupport => (0..n)
                .map(|i| {
                    if i == 0 {
                        return false;
                    }
                    let prev_close = cols.close[i - 1];
                    let base = if prev_close == 0.0 { ZERO_GUARD } else { prev_close };
                    let gap_pct = (cols.open[i] - prev_close) / base * 100.0;
                    gap_pct > GAP_UP_MIN_PCT && cols.low[i] > prev_close
                })
                .collect(),
            Condition::RsiOversoldBounce => {
                let r = rsi(&cols.close, DEFAULT_RSI_PERIOD);
                (0..n)
                    .map(|i| {
                        i > 0
                            && matches!((r[i - 1], r[i]), (Some(p), Some(c)) if p < RSI_OVERSOLD && c >= RSI_OVERSOLD)
                    })
                    .collect()
            }
            Condition::RsiOverbought => rsi(&cols.close, DEFAULT_RSI_PERIOD)
                .iter()
                .map(|v| v.is_some_and(|r| r > RSI_OVERBOUGHT))
                .collect(),
            Condition::MacdGoldenCross => {
                let m = macd_default(&cols.close);
                golden_cross(&m.line, &m.signal)
            }
            Condition::MacdDeadCross => {
                let m = macd_default(&cols.close);
                pairwise(&m.line, &m.signal, crossed_below)
            }
            Condition::ObvRising => diff(&obv(&cols.close, &cols.volume))
                .iter()
                .map(|d| d.is_some_and(|d| d > 0.0))
                .collect(),
            Condition::ObvFalling => diff(&obv(&cols.close, &cols.volume))
                .iter()
                .map(|d| d.is_some_and(|d| d < 0.0))
                .collect(),
            Condition::PullbackBounce => {
                pairwise(&cols.close, &ema(&cols.close, 20), crossed_above)
            }
            Condition::LowerHighPattern => {
                let s20 = sma(&cols.close, 20);
                let s20_slope = diff(&s20);
                let high_slope = diff_partial(&rolling_max(&cols.high, 20));
                (0..n)
                    .map(|i| {
                        s20_slope[i].is_some_and(|d| d < 0.0)
                            && cols.close[i] < s20[i]
                            && high_slope[i].is_some_and(|d| d < 0.0)
                    })
                    .collect()
            }
            Condition::FibonacciRetracement => {
                let low = rolling_min(&cols.low, FIB_LOOKBACK);
                let high = rolling_max(&cols.high, FIB_LOOKBACK);
                (0..n)
                    .map(|i| match (low[i], high[i]) {
                        (Some(l), Some(h)) => {
                            let span = if h - l == 0.0 { ZERO_GUARD } else { h - l };
                            let ratio = (cols.close[i] - l) / span;
                            ratio > FIB_LOWER && ratio < FIB_UPPER
                        }
                        _ => false,
                    })
                    .collect()
            }
            Condition::MaSupport => {
                let s20 = sma(&cols.close, 20);
                (0..n)
                    .map(|i| cols.low[i] >= s20[i] * MA_SUPPORT_TOLERANCE)
                    .collect()
            }
            // Needs order-book depth, which price bars do not carry.
            Condition::AskWallCleared | Condition::NoOp => vec![false; n],
            Condition::DowntrendBreakout => {
                pairwise(&cols.close, &sma(&cols.close, 50), crossed_above)
            }
            Condition::PsychologicalLevel => cols
                .close
                .iter()
                .map(|&c| {
                    let nearest = (c / PSYCH_STEP).round_ties_even() * PSYCH_STEP;
                    nearest != 0.0 && ((c - nearest).abs() / nearest) < PSYCH_BAND
                })
                .collect(),
            Condition::DayMaCross => golden_cross(&sma(&cols.close, 10), &sma(&cols.close, 60)),
            Condition::MidTrend => {
                let m = macd_default(&cols.close);
                m.line.iter().zip(m.signal.iter()).map(|(l, s)| l > s).collect()
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Apply a previous/current comparison between two aligned series.
fn pairwise<F>(a: &[f64], b: &[f64], cmp: F) -> Vec<bool>
where
    F: Fn(Option<f64>, Option<f64>, Option<f64>, Option<f64>) -> bool,
{
    let n = a.len().min(b.len());
    (0..n)
        .map(|i| i > 0 && cmp(Some(a[i - 1]), Some(b[i - 1]), Some(a[i]), Some(b[i])))
        .collect()
}

/// A trading style whose entry signal is the AND of a fixed set of conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    Scalp,
    Day,
    Mid,
}

impl Preset {
    pub fn conditions(&self) -> &'static [Condition] {
        match self {
            Preset::Scalp => &[Condition::VolumeSpike, Condition::ShortMaGoldenCross],
            Preset::Day => &[Condition::DayMaCross],
            Preset::Mid => &[Condition::MidTrend],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Scalp => "scalp",
            Preset::Day => "day",
            Preset::Mid => "mid",
        }
    }

    /// AND of the preset's conditions over `bars`. Empty bars give an empty signal.
    pub fn evaluate(&self, bars: &[PriceBar]) -> Vec<bool> {
        if bars.is_empty() {
            return Vec::new();
        }
        let cols = BarColumns::from_bars(bars);
        let mut signal = vec![true; cols.len()];
        for condition in self.conditions() {
            for (acc, hit) in signal.iter_mut().zip(condition.evaluate_columns(&cols)) {
                *acc = *acc && hit;
            }
        }
        signal
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scalp" => Ok(Preset::Scalp),
            "day" => Ok(Preset::Day),
            "mid" => Ok(Preset::Mid),
            other => Err(format!("unknown preset '{other}'")),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Evaluate a preset by name. Unknown presets and empty series yield an empty signal.
pub fn evaluate_preset(preset: &str, bars: &[PriceBar]) -> Vec<bool> {
    match preset.parse::<Preset>() {
        Ok(p) => p.evaluate(bars),
        Err(_) => Vec::new(),
    }
}

/// Preset evaluation against a price source.
pub struct ConditionEvaluator<'a> {
    prices: &'a dyn PricePort,
}

impl<'a> ConditionEvaluator<'a> {
    pub fn new(prices: &'a dyn PricePort) -> Self {
        Self { prices }
    }

    /// A failing price source degrades to an empty signal.
    pub fn evaluate(&self, symbol: &str, timeframe: &str, preset: &str) -> Vec<bool> {
        match self.prices.query(symbol, timeframe) {
            Ok(bars) => evaluate_preset(preset, &bars),
            Err(e) => {
                log::warn!("price query failed for {symbol} ({timeframe}): {e}");
                Vec::new()
            }
        }
    }
}
