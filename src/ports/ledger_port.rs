//! Order/trade persistence port trait.

use crate::domain::error::TradefuseError;
use crate::domain::order::{Order, Trade};

/// Idempotent upserts keyed by `order_id` and `trade_id`.
pub trait LedgerPort: Send + Sync {
    fn upsert_order(&self, order: &Order) -> Result<(), TradefuseError>;
    fn upsert_trade(&self, trade: &Trade) -> Result<(), TradefuseError>;
}
