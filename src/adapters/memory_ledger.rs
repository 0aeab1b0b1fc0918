//! In-process ledger used when no database is configured.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::domain::error::TradefuseError;
use crate::domain::order::{Order, Trade};
use crate::ports::ledger_port::LedgerPort;

#[derive(Debug, Default)]
pub struct MemoryLedger {
    orders: Mutex<BTreeMap<String, Order>>,
    trades: Mutex<BTreeMap<String, Trade>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Orders sorted by timestamp, then id.
    pub fn orders(&self) -> Vec<Order> {
        let mut out: Vec<Order> = self
            .orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.timestamp, &a.order_id).cmp(&(b.timestamp, &b.order_id)));
        out
    }

    /// Trades sorted by timestamp, then id.
    pub fn trades(&self) -> Vec<Trade> {
        let mut out: Vec<Trade> = self
            .trades
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.timestamp, &a.trade_id).cmp(&(b.timestamp, &b.trade_id)));
        out
    }
}

impl LedgerPort for MemoryLedger {
    fn upsert_order(&self, order: &Order) -> Result<(), TradefuseError> {
        self.orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(order.order_id.clone(), order.clone());
        Ok(())
    }

    fn upsert_trade(&self, trade: &Trade) -> Result<(), TradefuseError> {
        self.trades
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(trade.trade_id.clone(), trade.clone());
        Ok(())
    }
}
