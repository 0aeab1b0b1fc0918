//! Position book: the single store of truth for open positions.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::order::Side;
use super::position::Position;

/// Symbol to position map behind one lock. Reads hand out copies; writes are
/// crate-internal and only issued by the trade engine's fill path.
#[derive(Debug, Default)]
pub struct PositionBook {
    positions: Mutex<HashMap<String, Position>>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Position>> {
        self.positions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current position, or the empty default.
    pub fn get(&self, symbol: &str) -> Position {
        self.lock()
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| Position::empty(symbol))
    }

    /// Open positions ordered by symbol.
    pub fn positions(&self) -> Vec<Position> {
        let mut out: Vec<Position> = self.lock().values().filter(|p| p.is_open()).cloned().collect();
        out.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        out
    }

    /// The position a fill would produce, without storing it.
    pub(crate) fn preview_fill(&self, symbol: &str, side: Side, quantity: u64, price: f64) -> (Position, f64) {
        self.get(symbol).with_fill(side, quantity, price)
    }

    pub(crate) fn commit(&self, position: Position) {
        self.lock().insert(position.symbol.clone(), position);
    }

    /// Ratchet the trailing high up to `price`. Flat positions are left alone.
    pub(crate) fn observe_price(&self, symbol: &str, price: f64) -> Position {
        let mut map = self.lock();
        let pos = map
            .entry(symbol.to_string())
            .or_insert_with(|| Position::empty(symbol));
        if pos.is_open() {
            pos.trailing_high = Some(match pos.trailing_high {
                Some(high) if high >= price => high,
                _ => price,
            });
        }
        pos.clone()
    }

    /// Record a sold take-profit level. Ignored once the position is flat.
    pub(crate) fn mark_fired(&self, symbol: &str, level_x100: i64) {
        if let Some(pos) = self.lock().get_mut(symbol) {
            if pos.is_open() {
                pos.fired_levels.insert(level_x100);
            }
        }
    }

    /// Forget a fired level whose sell order was canceled.
    pub(crate) fn rearm(&self, symbol: &str, level_x100: i64) {
        if let Some(pos) = self.lock().get_mut(symbol) {
            pos.fired_levels.remove(&level_x100);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn book_with(symbol: &str, qty: u64, avg: f64) -> PositionBook {
        let book = PositionBook::new();
        let (pos, _) = book.preview_fill(symbol, Side::Buy, qty, avg);
        book.commit(pos);
        book
    }

    #[test]
    fn unknown_symbol_is_empty() {
        let book = PositionBook::new();
        assert_eq!(book.get("NONE"), Position::empty("NONE"));
        assert!(book.positions().is_empty());
    }

    #[test]
    fn preview_does_not_store() {
        let book = PositionBook::new();
        let (pos, _) = book.preview_fill("A", Side::Buy, 5, 10.0);
        assert_eq!(pos.quantity, 5);
        assert!(!book.get("A").is_open());
        book.commit(pos);
        assert_eq!(book.get("A").quantity, 5);
        assert_eq!(book.positions().len(), 1);
    }

    #[test]
    fn positions_sorted_and_open_only() {
        let book = book_with("B", 1, 10.0);
        let (a, _) = book.preview_fill("A", Side::Buy, 2, 5.0);
        book.commit(a);
        let (c, _) = book.preview_fill("C", Side::Buy, 0, 5.0);
        book.commit(c);
        let symbols: Vec<String> = book.positions().into_iter().map(|p| p.symbol).collect();
        assert_eq!(symbols, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn trailing_high_initializes_then_ratchets() {
        let book = book_with("A", 10, 100.0);
        assert_eq!(book.observe_price("A", 101.0).trailing_high, Some(101.0));
        assert_eq!(book.observe_price("A", 99.0).trailing_high, Some(101.0));
        assert_eq!(book.observe_price("A", 103.0).trailing_high, Some(103.0));
    }

    #[test]
    fn flat_position_has_no_trailing_high() {
        let book = PositionBook::new();
        assert!(book.observe_price("A", 50.0).trailing_high.is_none());
    }

    #[test]
    fn mark_fired_ignored_when_flat() {
        let book = book_with("A", 10, 100.0);
        book.mark_fired("A", 200);
        assert!(book.get("A").has_fired(200));

        let (flat, _) = book.preview_fill("A", Side::Sell, 10, 100.0);
        book.commit(flat);
        book.mark_fired("A", 400);
        assert!(book.get("A").fired_levels.is_empty());
    }

    #[test]
    fn rearm_clears_only_that_level() {
        let book = book_with("A", 10, 100.0);
        book.mark_fired("A", 200);
        book.mark_fired("A", 500);
        book.rearm("A", 200);
        assert!(!book.get("A").has_fired(200));
        assert!(book.get("A").has_fired(500));
        book.rearm("NONE", 200);
        assert!(book.get("NONE").fired_levels.is_empty());
    }

    proptest! {
        #[test]
        fn trailing_high_never_decreases(prices in proptest::collection::vec(1.0f64..1000.0, 1..50)) {
            let book = book_with("A", 10, 100.0);
            let mut prev: Option<f64> = None;
            for p in prices {
                let high = book.observe_price("A", p).trailing_high;
                prop_assert!(high.is_some());
                if let (Some(before), Some(after)) = (prev, high) {
                    prop_assert!(after >= before);
                }
                prev = high;
            }
        }
    }
}
