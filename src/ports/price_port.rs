//! Price history port trait.

use crate::domain::error::TradefuseError;
use crate::domain::price_bar::PriceBar;

pub trait PricePort: Send + Sync {
    /// Chronologically sorted, deduplicated bars. An empty series is a valid answer.
    fn query(&self, symbol: &str, timeframe: &str) -> Result<Vec<PriceBar>, TradefuseError>;

    /// Close of the most recent bar on `timeframe`, if any.
    fn last_price(&self, symbol: &str, timeframe: &str) -> Result<Option<f64>, TradefuseError> {
        Ok(self.query(symbol, timeframe)?.last().map(|b| b.close))
    }
}
