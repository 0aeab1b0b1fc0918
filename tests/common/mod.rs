#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};

use tradefuse::domain::error::TradefuseError;
use tradefuse::domain::order::{BrokerReceipt, Order, OrderRequest, OrderStatus, Trade};
pub use tradefuse::domain::price_bar::PriceBar;
use tradefuse::domain::rationale::{Profile, WeightedRule};
use tradefuse::domain::trade_engine::TradeEngine;
use tradefuse::ports::broker_port::BrokerPort;
use tradefuse::ports::ledger_port::LedgerPort;
use tradefuse::ports::notify_port::NotifyPort;
use tradefuse::ports::price_port::PricePort;
use tradefuse::ports::rule_port::RulePort;

pub const SYMBOL: &str = "A005930";

pub fn make_bar(symbol: &str, timeframe: &str, ts: i64, close: f64) -> PriceBar {
    PriceBar {
        symbol: symbol.to_string(),
        timeframe: timeframe.to_string(),
        timestamp: ts,
        open: close,
        high: close + 0.5,
        low: close - 0.5,
        close,
        volume: 1_000.0,
    }
}

/// Bars one minute apart with the given closes.
pub fn series(symbol: &str, closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(symbol, "1m", i as i64 * 60_000, c))
        .collect()
}

/// Accelerating uptrend: MACD line above its signal at the last bar.
pub fn uptrend(symbol: &str, n: usize) -> Vec<PriceBar> {
    let closes: Vec<f64> = (0..n)
        .map(|i| 100.0 + i as f64 * 0.5 + (i * i) as f64 * 0.01)
        .collect();
    series(symbol, &closes)
}

#[derive(Default)]
pub struct MockPricePort {
    bars: Mutex<HashMap<(String, String), Vec<PriceBar>>>,
    errors: Mutex<HashMap<String, String>>,
}

impl MockPricePort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bars(self, symbol: &str, timeframe: &str, bars: Vec<PriceBar>) -> Self {
        self.bars
            .lock()
            .unwrap()
            .insert((symbol.to_string(), timeframe.to_string()), bars);
        self
    }

    pub fn with_error(self, symbol: &str, reason: &str) -> Self {
        self.errors
            .lock()
            .unwrap()
            .insert(symbol.to_string(), reason.to_string());
        self
    }

    /// Append a 1m bar closing at `price`, making it the last price.
    pub fn set_price(&self, symbol: &str, price: f64) {
        let mut map = self.bars.lock().unwrap();
        let bars = map
            .entry((symbol.to_string(), "1m".to_string()))
            .or_default();
        let ts = bars.last().map_or(0, |b| b.timestamp + 60_000);
        bars.push(make_bar(symbol, "1m", ts, price));
    }
}

impl PricePort for MockPricePort {
    fn query(&self, symbol: &str, timeframe: &str) -> Result<Vec<PriceBar>, TradefuseError> {
        if let Some(reason) = self.errors.lock().unwrap().get(symbol) {
            return Err(TradefuseError::Database {
                reason: reason.clone(),
            });
        }
        Ok(self
            .bars
            .lock()
            .unwrap()
            .get(&(symbol.to_string(), timeframe.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone)]
pub enum Scripted {
    Status(OrderStatus),
    Fail(String),
}

/// Fills at the requested price, or at the last 1m close for market orders,
/// unless a scripted response is queued.
pub struct MockBroker {
    prices: Arc<MockPricePort>,
    script: Mutex<VecDeque<Scripted>>,
    pub requests: Mutex<Vec<OrderRequest>>,
    counter: Mutex<u64>,
}

impl MockBroker {
    pub fn new(prices: Arc<MockPricePort>) -> Self {
        Self {
            prices,
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            counter: Mutex::new(0),
        }
    }

    pub fn push(&self, response: Scripted) {
        self.script.lock().unwrap().push_back(response);
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl BrokerPort for MockBroker {
    fn place_order(&self, request: &OrderRequest) -> Result<BrokerReceipt, TradefuseError> {
        self.requests.lock().unwrap().push(request.clone());
        let id = {
            let mut n = self.counter.lock().unwrap();
            *n += 1;
            format!("mock-{n}")
        };
        let fill_price = match request.price {
            Some(p) => p,
            None => self
                .prices
                .last_price(&request.symbol, "1m")?
                .unwrap_or(0.0),
        };
        let status = match self.script.lock().unwrap().pop_front() {
            Some(Scripted::Fail(reason)) => {
                return Err(TradefuseError::Broker {
                    symbol: request.symbol.clone(),
                    reason,
                });
            }
            Some(Scripted::Status(status)) => status,
            None => OrderStatus::Filled,
        };
        Ok(BrokerReceipt {
            order_id: id,
            status,
            fill_price,
        })
    }
}

/// Broker that signals on entry and blocks until released.
pub struct GatedBroker {
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl GatedBroker {
    pub fn new(entered: Sender<()>, release: Receiver<()>) -> Self {
        Self {
            entered: Mutex::new(entered),
            release: Mutex::new(release),
        }
    }
}

impl BrokerPort for GatedBroker {
    fn place_order(&self, request: &OrderRequest) -> Result<BrokerReceipt, TradefuseError> {
        let _ = self.entered.lock().unwrap().send(());
        let _ = self.release.lock().unwrap().recv();
        Ok(BrokerReceipt {
            order_id: "gated-1".into(),
            status: OrderStatus::Filled,
            fill_price: request.price.unwrap_or(100.0),
        })
    }
}

#[derive(Default)]
pub struct MockRules {
    weights: HashMap<Profile, Vec<WeightedRule>>,
}

impl MockRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, profile: Profile, rules: &[(&str, f64)]) -> Self {
        self.weights.insert(
            profile,
            rules
                .iter()
                .map(|(name, w)| WeightedRule::new(*name, *w))
                .collect(),
        );
        self
    }
}

impl RulePort for MockRules {
    fn get_weights(&self, profile: Profile) -> Result<Vec<WeightedRule>, TradefuseError> {
        Ok(self.weights.get(&profile).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct RecordingLedger {
    pub orders: Mutex<Vec<Order>>,
    pub trades: Mutex<Vec<Trade>>,
    pub fail_trades: bool,
}

impl RecordingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_trades() -> Self {
        Self {
            fail_trades: true,
            ..Self::default()
        }
    }

    pub fn orders(&self) -> Vec<Order> {
        self.orders.lock().unwrap().clone()
    }

    pub fn trades(&self) -> Vec<Trade> {
        self.trades.lock().unwrap().clone()
    }
}

impl LedgerPort for RecordingLedger {
    fn upsert_order(&self, order: &Order) -> Result<(), TradefuseError> {
        let mut orders = self.orders.lock().unwrap();
        orders.retain(|o| o.order_id != order.order_id);
        orders.push(order.clone());
        Ok(())
    }

    fn upsert_trade(&self, trade: &Trade) -> Result<(), TradefuseError> {
        if self.fail_trades {
            return Err(TradefuseError::DatabaseQuery {
                reason: "disk full".into(),
            });
        }
        self.trades.lock().unwrap().push(trade.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
}

impl NotifyPort for RecordingNotifier {
    fn send(&self, text: &str) -> bool {
        self.messages.lock().unwrap().push(text.to_string());
        true
    }
}

/// Engine over mocks, plus handles to inspect them.
pub struct Harness {
    pub engine: TradeEngine,
    pub prices: Arc<MockPricePort>,
    pub broker: Arc<MockBroker>,
    pub ledger: Arc<RecordingLedger>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn harness_with(prices: MockPricePort, rules: MockRules, ledger: RecordingLedger) -> Harness {
    let prices = Arc::new(prices);
    let broker = Arc::new(MockBroker::new(Arc::clone(&prices)));
    let ledger = Arc::new(ledger);
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = TradeEngine::new(
        broker.clone(),
        prices.clone(),
        Arc::new(rules),
        ledger.clone(),
    )
    .with_notifier(notifier.clone());
    Harness {
        engine,
        prices,
        broker,
        ledger,
        notifier,
    }
}

pub fn harness() -> Harness {
    harness_with(MockPricePort::new(), MockRules::new(), RecordingLedger::new())
}
