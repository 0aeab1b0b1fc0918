//! Per-symbol position state and fill arithmetic.

use std::collections::BTreeSet;

use super::order::Side;

/// Long-only holding in one symbol. The default value is the empty, flat position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub quantity: u64,
    pub average_cost: f64,
    /// Highest last price observed while open.
    pub trailing_high: Option<f64>,
    /// Take-profit thresholds already sold into, as gain percent x 100.
    pub fired_levels: BTreeSet<i64>,
}

impl Position {
    pub fn empty(symbol: &str) -> Self {
        Position {
            symbol: symbol.to_string(),
            ..Default::default()
        }
    }

    pub fn is_open(&self) -> bool {
        self.quantity > 0
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity as f64 * (price - self.average_cost)
    }

    /// Percent change of `price` over the average cost. `None` without a cost basis.
    pub fn gain_pct(&self, price: f64) -> Option<f64> {
        if self.average_cost > 0.0 {
            Some((price - self.average_cost) / self.average_cost * 100.0)
        } else {
            None
        }
    }

    /// Percent change of `price` from the trailing high. `None` before the first observation.
    pub fn drawdown_pct(&self, price: f64) -> Option<f64> {
        match self.trailing_high {
            Some(high) if high > 0.0 => Some((price - high) / high * 100.0),
            _ => None,
        }
    }

    pub fn has_fired(&self, level_x100: i64) -> bool {
        self.fired_levels.contains(&level_x100)
    }

    /// The position after a fill, plus the realized PnL of that fill.
    ///
    /// Buys re-average the cost basis and realize nothing. Sells realize
    /// `(price - average_cost)` on the quantity actually held and floor the
    /// remainder at zero; reaching zero clears the cost basis, trailing high
    /// and fired levels.
    pub fn with_fill(&self, side: Side, quantity: u64, price: f64) -> (Position, f64) {
        let mut next = self.clone();
        match side {
            Side::Buy => {
                let new_qty = self.quantity + quantity;
                if new_qty > 0 {
                    next.average_cost = (self.average_cost * self.quantity as f64
                        + price * quantity as f64)
                        / new_qty as f64;
                }
                next.quantity = new_qty;
                (next, 0.0)
            }
            Side::Sell => {
                let sold = quantity.min(self.quantity);
                let pnl = (price - self.average_cost) * sold as f64;
                next.quantity = self.quantity.saturating_sub(quantity);
                if next.quantity == 0 {
                    next = Position::empty(&self.symbol);
                }
                (next, pnl)
            }
        }
    }
}
