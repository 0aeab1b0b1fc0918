//! Order and trade records exchanged with the broker and the ledger.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(format!("unknown order side '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    New,
    Filled,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Canceled => "CANCELED",
        }
    }

    pub fn is_filled(&self) -> bool {
        matches!(self, OrderStatus::Filled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NEW" => Ok(OrderStatus::New),
            "FILLED" => Ok(OrderStatus::Filled),
            "CANCELED" | "CANCELLED" => Ok(OrderStatus::Canceled),
            other => Err(format!("unknown order status '{other}'")),
        }
    }
}

/// What the engine asks the broker to do.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub quantity: u64,
    /// `None` is a market order.
    pub price: Option<f64>,
}

/// What the broker reports back for a submitted order.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerReceipt {
    pub order_id: String,
    pub status: OrderStatus,
    pub fill_price: f64,
}

/// Persisted order log entry, keyed by the broker-assigned id.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    pub quantity: u64,
    pub price: f64,
    pub status: OrderStatus,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

/// Persisted fill. Quantity is signed: positive for buys, negative for sells.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub trade_id: String,
    pub order_id: String,
    pub symbol: String,
    pub quantity: i64,
    pub price: f64,
    pub realized_pnl: f64,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl Trade {
    pub fn side(&self) -> Side {
        if self.quantity < 0 { Side::Sell } else { Side::Buy }
    }
}
