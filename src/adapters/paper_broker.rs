//! Paper broker: fills immediately without touching a real exchange.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::error::TradefuseError;
use crate::domain::order::{BrokerReceipt, OrderRequest, OrderStatus};
use crate::ports::broker_port::BrokerPort;
use crate::ports::price_port::PricePort;

/// Fills at the requested price, or at the last close of `timeframe` for
/// market orders. A market order with no price available is canceled.
pub struct PaperBroker {
    prices: Arc<dyn PricePort>,
    timeframe: String,
}

impl PaperBroker {
    pub fn new(prices: Arc<dyn PricePort>, timeframe: impl Into<String>) -> Self {
        Self {
            prices,
            timeframe: timeframe.into(),
        }
    }
}

impl BrokerPort for PaperBroker {
    fn place_order(&self, request: &OrderRequest) -> Result<BrokerReceipt, TradefuseError> {
        let price = match request.price {
            Some(p) => Some(p),
            None => self
                .prices
                .last_price(&request.symbol, &self.timeframe)
                .map_err(|e| TradefuseError::Broker {
                    symbol: request.symbol.clone(),
                    reason: format!("no quote: {e}"),
                })?,
        };
        let order_id = Uuid::new_v4().to_string();
        Ok(match price {
            Some(fill_price) => BrokerReceipt {
                order_id,
                status: OrderStatus::Filled,
                fill_price,
            },
            None => {
                log::warn!("paper broker: no price for {}, canceling", request.symbol);
                BrokerReceipt {
                    order_id,
                    status: OrderStatus::Canceled,
                    fill_price: 0.0,
                }
            }
        })
    }
}
