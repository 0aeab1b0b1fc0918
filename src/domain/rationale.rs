//! Human score: weighted fraction of configured rationale rules true at the latest bar.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::condition::Condition;
use crate::domain::price_bar::{BarColumns, PriceBar};
use crate::ports::price_port::PricePort;
use crate::ports::rule_port::RulePort;

/// Trading profile a set of rationale weights belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Profile {
    Scalp,
    Day,
    Mid,
}

impl Profile {
    pub const ALL: [Profile; 3] = [Profile::Scalp, Profile::Day, Profile::Mid];

    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Scalp => "scalp",
            Profile::Day => "day",
            Profile::Mid => "mid",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scalp" => Ok(Profile::Scalp),
            "day" => Ok(Profile::Day),
            "mid" => Ok(Profile::Mid),
            other => Err(format!("unknown profile '{other}' (expected scalp, day or mid)")),
        }
    }
}

/// An authored rule. Replaced wholesale on re-import.
#[derive(Debug, Clone, PartialEq)]
pub struct RationaleItem {
    pub id: i64,
    pub name: String,
    pub note: String,
    pub order_idx: i64,
}

/// Weight of one item within one profile, 0 to 100.
#[derive(Debug, Clone, PartialEq)]
pub struct RationaleWeight {
    pub profile: Profile,
    pub item_id: i64,
    pub weight: f64,
}

/// A (rule name, weight) pair as served by a [`RulePort`].
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedRule {
    pub name: String,
    pub weight: f64,
}

impl WeightedRule {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }

    /// Known condition with a positive finite weight.
    pub fn is_usable(&self) -> bool {
        self.weight.is_finite() && self.weight > 0.0 && !Condition::lookup(&self.name).is_noop()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HumanScore {
    /// 0 to 100, two decimals.
    pub score: f64,
    /// Rule name to 1.0 (true at the latest bar) or 0.0.
    pub detail: BTreeMap<String, f64>,
}

/// Usable rules with weights rescaled to sum to 100. Empty when nothing is usable.
pub fn normalized_weights(rows: &[WeightedRule]) -> Vec<WeightedRule> {
    let usable: Vec<&WeightedRule> = rows.iter().filter(|r| r.is_usable()).collect();
    let total: f64 = usable.iter().map(|r| r.weight).sum();
    if total <= 0.0 {
        return Vec::new();
    }
    usable
        .into_iter()
        .map(|r| WeightedRule::new(r.name.clone(), r.weight * 100.0 / total))
        .collect()
}

pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub fn compute_human_score(bars: &[PriceBar], rows: &[WeightedRule]) -> HumanScore {
    if bars.is_empty() {
        return HumanScore::default();
    }
    let weights = normalized_weights(rows);
    if weights.is_empty() {
        return HumanScore::default();
    }

    let cols = BarColumns::from_bars(bars);
    let mut score = 0.0;
    let mut detail = BTreeMap::new();
    for rule in &weights {
        let hit = Condition::lookup(&rule.name)
            .evaluate_columns(&cols)
            .last()
            .copied()
            .unwrap_or(false);
        let flag = if hit { 1.0 } else { 0.0 };
        score += rule.weight * flag;
        detail.insert(rule.name.clone(), flag);
    }
    HumanScore {
        score: round2(score.clamp(0.0, 100.0)),
        detail,
    }
}

/// Human score service over injected price and rule sources.
pub struct RationaleScorer<'a> {
    prices: &'a dyn PricePort,
    rules: &'a dyn RulePort,
}

impl<'a> RationaleScorer<'a> {
    pub fn new(prices: &'a dyn PricePort, rules: &'a dyn RulePort) -> Self {
        Self { prices, rules }
    }

    /// Source failures are logged and score 0.
    pub fn score(&self, symbol: &str, timeframe: &str, profile: Profile) -> HumanScore {
        let rows = match self.rules.get_weights(profile) {
            Ok(rows) => rows,
            Err(e) => {
                log::warn!("rule weights unavailable for profile {profile}: {e}");
                return HumanScore::default();
            }
        };
        if rows.is_empty() {
            log::debug!("profile {profile} has no configured rules");
            return HumanScore::default();
        }
        let bars = match self.prices.query(symbol, timeframe) {
            Ok(bars) => bars,
            Err(e) => {
                log::warn!("price query failed for {symbol} ({timeframe}): {e}");
                return HumanScore::default();
            }
        };
        compute_human_score(&bars, &rows)
    }
}
