//! Exit rules for open positions: stop-loss, trailing stop, take-profit ladder.
//!
//! Each check is a pure function of the current [`Position`] and last price and
//! yields at most one [`SellIntent`]. The trade engine runs them in order and
//! applies each intent before the next check looks at the position.

use std::fmt;
use std::str::FromStr;

use super::error::ParseError;
use super::position::Position;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TakeProfitRung {
    pub gain_pct: f64,
    pub sell_fraction: f64,
}

impl TakeProfitRung {
    /// Key under which this rung is remembered as fired.
    pub fn level_x100(&self) -> i64 {
        (self.gain_pct * 100.0).round() as i64
    }

    /// max(1, floor(quantity x fraction)), never more than is held.
    pub fn sell_quantity(&self, quantity: u64) -> u64 {
        let portion = (quantity as f64 * self.sell_fraction).floor() as u64;
        portion.max(1).min(quantity)
    }
}

/// Rungs sorted ascending by gain threshold, thresholds unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TakeProfitLadder {
    rungs: Vec<TakeProfitRung>,
}

impl TakeProfitLadder {
    pub fn new(mut rungs: Vec<TakeProfitRung>) -> Self {
        rungs.sort_by(|a, b| a.gain_pct.total_cmp(&b.gain_pct));
        rungs.dedup_by_key(|r| r.level_x100());
        Self { rungs }
    }

    pub fn rungs(&self) -> &[TakeProfitRung] {
        &self.rungs
    }

    pub fn is_empty(&self) -> bool {
        self.rungs.is_empty()
    }
}

impl fmt::Display for TakeProfitLadder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, r) in self.rungs.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}@{}", r.gain_pct, r.sell_fraction)?;
        }
        Ok(())
    }
}

struct LadderParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> LadderParser<'a> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.pos += ch.len_utf8();
        }
    }

    fn error(&self, message: impl Into<String>, position: usize) -> ParseError {
        ParseError {
            message: message.into(),
            position,
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.pos += ch.len_utf8();
                Ok(())
            }
            Some(ch) => Err(self.error(format!("expected '{expected}', found '{ch}'"), self.pos)),
            None => Err(self.error(format!("expected '{expected}', found end of input"), self.pos)),
        }
    }

    fn number(&mut self) -> Result<(f64, usize), ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut digits = 0;
        let mut has_dot = false;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
            } else if ch == '.' && !has_dot {
                has_dot = true;
            } else {
                break;
            }
            self.pos += 1;
        }
        if digits == 0 {
            return Err(self.error("expected number", start));
        }
        let text = &self.input[start..self.pos];
        text.parse::<f64>()
            .map(|v| (v, start))
            .map_err(|_| self.error(format!("invalid number: {text}"), start))
    }

    fn rung(&mut self) -> Result<TakeProfitRung, ParseError> {
        let (gain_pct, _) = self.number()?;
        self.expect('@')?;
        let (sell_fraction, at) = self.number()?;
        if !(sell_fraction > 0.0 && sell_fraction <= 1.0) {
            return Err(self.error(
                format!("sell fraction must be in (0, 1], got {sell_fraction}"),
                at,
            ));
        }
        Ok(TakeProfitRung {
            gain_pct,
            sell_fraction,
        })
    }

    fn ladder(mut self) -> Result<TakeProfitLadder, ParseError> {
        self.skip_whitespace();
        if self.peek().is_none() {
            return Ok(TakeProfitLadder::default());
        }
        let mut rungs: Vec<TakeProfitRung> = Vec::new();
        loop {
            let start = {
                self.skip_whitespace();
                self.pos
            };
            let rung = self.rung()?;
            if rungs.iter().any(|r| r.level_x100() == rung.level_x100()) {
                return Err(self.error(format!("duplicate gain level {}", rung.gain_pct), start));
            }
            rungs.push(rung);
            self.skip_whitespace();
            match self.peek() {
                None => break,
                Some(',') => self.pos += 1,
                Some(ch) => return Err(self.error(format!("expected ',', found '{ch}'"), self.pos)),
            }
        }
        Ok(TakeProfitLadder::new(rungs))
    }
}

impl FromStr for TakeProfitLadder {
    type Err = ParseError;

    /// `"2@0.3,4@0.3,6@0.4"`: sell 30% at +2%, 30% at +4%, 40% at +6%.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LadderParser { input: s, pos: 0 }.ladder()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExitReason {
    StopLoss,
    TrailingStop,
    TakeProfit { level_x100: i64 },
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StopLoss => f.write_str("stop-loss"),
            ExitReason::TrailingStop => f.write_str("trailing-stop"),
            ExitReason::TakeProfit { level_x100 } => {
                write!(f, "take-profit {}%", *level_x100 as f64 / 100.0)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SellIntent {
    pub reason: ExitReason,
    pub quantity: u64,
}

/// Full exit once the loss reaches `stop_pct` (inclusive).
pub fn check_stop_loss(position: &Position, price: f64, stop_pct: f64) -> Option<SellIntent> {
    if !position.is_open() {
        return None;
    }
    let gain = position.gain_pct(price)?;
    (gain <= -stop_pct.abs()).then_some(SellIntent {
        reason: ExitReason::StopLoss,
        quantity: position.quantity,
    })
}

/// Full exit once price has fallen `trail_pct` from the trailing high (inclusive).
/// Expects the trailing high to already include `price`.
pub fn check_trailing_stop(position: &Position, price: f64, trail_pct: f64) -> Option<SellIntent> {
    if !position.is_open() {
        return None;
    }
    let drawdown = position.drawdown_pct(price)?;
    (drawdown <= -trail_pct.abs()).then_some(SellIntent {
        reason: ExitReason::TrailingStop,
        quantity: position.quantity,
    })
}

/// Partial exit for one rung if the gain has reached it and it has not fired yet.
pub fn check_take_profit(position: &Position, price: f64, rung: &TakeProfitRung) -> Option<SellIntent> {
    if !position.is_open() || position.has_fired(rung.level_x100()) {
        return None;
    }
    let gain = position.gain_pct(price)?;
    (gain >= rung.gain_pct).then(|| SellIntent {
        reason: ExitReason::TakeProfit {
            level_x100: rung.level_x100(),
        },
        quantity: rung.sell_quantity(position.quantity),
    })
}
