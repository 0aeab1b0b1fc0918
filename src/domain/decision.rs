//! Threshold decision over the fused score.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
            Action::Hold => "HOLD",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub action: Action,
    pub final_score: f64,
}

/// final = mean of the two scores. BUY is tested first, both bounds inclusive.
pub fn decide(human: f64, ai: f64, buy_threshold: u8, sell_threshold: u8) -> Decision {
    let final_score = (human + ai) / 2.0;
    let action = if final_score >= f64::from(buy_threshold) {
        Action::Buy
    } else if final_score <= f64::from(sell_threshold) {
        Action::Sell
    } else {
        Action::Hold
    };
    Decision {
        action,
        final_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_boundary_inclusive() {
        let d = decide(70.0, 70.0, 70, 40);
        assert_eq!(d.action, Action::Buy);
        assert_eq!(d.final_score, 70.0);
    }

    #[test]
    fn sell_boundary_inclusive() {
        let d = decide(30.0, 50.0, 70, 40);
        assert_eq!(d.final_score, 40.0);
        assert_eq!(d.action, Action::Sell);
    }

    #[test]
    fn hold_between_thresholds() {
        assert_eq!(decide(60.0, 50.0, 70, 40).action, Action::Hold);
    }

    #[test]
    fn buy_checked_before_sell_when_ranges_overlap() {
        // buy at >= 30, sell at <= 60: 50 satisfies both
        assert_eq!(decide(50.0, 50.0, 30, 60).action, Action::Buy);
        assert_eq!(decide(10.0, 10.0, 30, 60).action, Action::Sell);
    }

    #[test]
    fn action_display() {
        assert_eq!(Action::Buy.to_string(), "BUY");
        assert_eq!(Action::Sell.to_string(), "SELL");
        assert_eq!(Action::Hold.to_string(), "HOLD");
    }
}
