//! Broker capability port trait.

use crate::domain::error::TradefuseError;
use crate::domain::order::{BrokerReceipt, OrderRequest};

pub trait BrokerPort: Send + Sync {
    /// Submit an order and block until the broker answers with a terminal or
    /// pending status. Submission errors and timeouts are `TradefuseError::Broker`.
    fn place_order(&self, request: &OrderRequest) -> Result<BrokerReceipt, TradefuseError>;
}
