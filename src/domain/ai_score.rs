//! Heuristic AI score blending the human score with market features.

use std::fmt;

use crate::domain::rationale::round2;

/// Risk appetite selecting the (risk weight, position weight) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RiskPosture {
    Conservative,
    #[default]
    Normal,
    Aggressive,
}

impl RiskPosture {
    /// Case-insensitive prefix match on "cons" and "agg"; anything else is Normal.
    pub fn from_mode(mode: &str) -> Self {
        let mode = mode.trim().to_ascii_lowercase();
        if mode.starts_with("cons") {
            RiskPosture::Conservative
        } else if mode.starts_with("agg") {
            RiskPosture::Aggressive
        } else {
            RiskPosture::Normal
        }
    }

    /// (risk_weight, position_weight)
    pub fn weights(&self) -> (f64, f64) {
        match self {
            RiskPosture::Conservative => (1.4, 0.8),
            RiskPosture::Normal => (1.0, 1.0),
            RiskPosture::Aggressive => (0.7, 1.3),
        }
    }
}

impl fmt::Display for RiskPosture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskPosture::Conservative => "Conservative",
            RiskPosture::Normal => "Normal",
            RiskPosture::Aggressive => "Aggressive",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketFeatures {
    pub volatility: f64,
    pub spread: f64,
    pub momentum: f64,
    pub trend: f64,
}

impl Default for MarketFeatures {
    fn default() -> Self {
        Self {
            volatility: 0.02,
            spread: 0.2,
            momentum: 0.5,
            trend: 0.5,
        }
    }
}

impl MarketFeatures {
    /// Non-finite inputs fall back to the default magnitude for that feature.
    pub fn sanitized(&self) -> Self {
        let d = MarketFeatures::default();
        let pick = |v: f64, fallback: f64| if v.is_finite() { v } else { fallback };
        Self {
            volatility: pick(self.volatility, d.volatility),
            spread: pick(self.spread, d.spread),
            momentum: pick(self.momentum, d.momentum),
            trend: pick(self.trend, d.trend),
        }
    }

    pub fn risk_penalty(&self) -> f64 {
        2.0 * self.volatility + 0.5 * self.spread
    }

    pub fn position_bonus(&self) -> f64 {
        0.7 * (self.momentum + self.trend)
    }
}

/// Score in [0, 100], two decimals. Total over all inputs.
pub fn ai_score(features: &MarketFeatures, human_score: f64, posture: RiskPosture) -> f64 {
    let f = features.sanitized();
    let r = if human_score.is_finite() {
        (human_score / 100.0).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (risk_w, pos_w) = posture.weights();
    let raw = 0.4 * r + 0.6 * (pos_w * f.position_bonus() - risk_w * f.risk_penalty() + 0.5);
    round2(raw.clamp(0.0, 1.0) * 100.0)
}
