//! Daily settlement: realized PnL and net quantity per (date, symbol).

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate};

use super::order::Trade;

#[derive(Debug, Clone, PartialEq)]
pub struct DailyPnl {
    pub date: NaiveDate,
    pub symbol: String,
    pub net_quantity: i64,
    pub realized_pnl: f64,
}

/// Group trades by UTC date of their timestamp and symbol, sorted by both.
pub fn daily_pnl(trades: &[Trade]) -> Vec<DailyPnl> {
    let mut groups: BTreeMap<(NaiveDate, String), (i64, f64)> = BTreeMap::new();
    for trade in trades {
        let Some(ts) = DateTime::from_timestamp_millis(trade.timestamp) else {
            log::warn!("trade {} has out-of-range timestamp {}", trade.trade_id, trade.timestamp);
            continue;
        };
        let entry = groups
            .entry((ts.date_naive(), trade.symbol.clone()))
            .or_insert((0, 0.0));
        entry.0 += trade.quantity;
        entry.1 += trade.realized_pnl;
    }
    groups
        .into_iter()
        .map(|((date, symbol), (net_quantity, realized_pnl))| DailyPnl {
            date,
            symbol,
            net_quantity,
            realized_pnl,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY_MS: i64 = 86_400_000;

    fn trade(ts: i64, symbol: &str, qty: i64, pnl: f64) -> Trade {
        Trade {
            trade_id: format!("t{ts}{symbol}"),
            order_id: "o".into(),
            symbol: symbol.into(),
            quantity: qty,
            price: 100.0,
            realized_pnl: pnl,
            timestamp: ts,
        }
    }

    #[test]
    fn empty_ledger() {
        assert!(daily_pnl(&[]).is_empty());
    }

    #[test]
    fn groups_by_day_and_symbol() {
        let trades = vec![
            trade(DAY_MS + 1, "B", 10, 0.0),
            trade(1, "A", 10, 0.0),
            trade(2, "A", -4, 8.0),
            trade(DAY_MS + 5, "B", -10, -3.5),
            trade(3, "A", -6, 12.0),
        ];
        let out = daily_pnl(&trades);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].date, NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());
        assert_eq!(out[0].symbol, "A");
        assert_eq!(out[0].net_quantity, 0);
        assert_eq!(out[0].realized_pnl, 20.0);
        assert_eq!(out[1].date, NaiveDate::from_ymd_opt(1970, 1, 2).unwrap());
        assert_eq!(out[1].symbol, "B");
        assert_eq!(out[1].realized_pnl, -3.5);
    }
}
