//! Trade engine: order submission, fill reconciliation and the per-symbol risk tick.
//!
//! The engine is the only writer of the [`PositionBook`] and of order/trade
//! records. Every fill for a symbol happens under that symbol's lock, so manual
//! orders and the automated risk path never interleave. The risk path only
//! try-locks: if an order for the symbol is already in flight the tick reports
//! [`TickOutcome::Busy`] instead of queueing a second one.
//!
//! An order the broker accepts without filling stays pending until
//! [`TradeEngine::on_order_update`] resolves it. While a risk-path exit is
//! pending for a symbol its ticks report `Busy` as well.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};

use chrono::Utc;
use uuid::Uuid;

use crate::domain::ai_score::ai_score;
use crate::domain::decision::{Action, Decision, decide};
use crate::domain::error::TradefuseError;
use crate::domain::order::{Order, OrderRequest, OrderStatus, Side, Trade};
use crate::domain::portfolio::PositionBook;
use crate::domain::position::Position;
use crate::domain::rationale::{HumanScore, RationaleScorer};
use crate::domain::risk::{
    ExitReason, SellIntent, TakeProfitLadder, check_stop_loss, check_take_profit, check_trailing_stop,
};
use crate::domain::settings::{EntrySettings, RiskSettings};
use crate::ports::broker_port::BrokerPort;
use crate::ports::ledger_port::LedgerPort;
use crate::ports::notify_port::NotifyPort;
use crate::ports::price_port::PricePort;
use crate::ports::rule_port::RulePort;

/// Result of one submitted order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderReport {
    pub order: Order,
    /// Present only for FILLED orders.
    pub trade: Option<Trade>,
    /// Position after the order was reconciled.
    pub position: Position,
}

/// Outcome of one automated risk tick for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Disabled,
    Busy,
    Evaluated(Vec<OrderReport>),
    /// A later step failed after earlier exits were already reconciled.
    Interrupted {
        reports: Vec<OrderReport>,
        error: String,
    },
}

/// An accepted order the broker has not resolved yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOrder {
    pub order: Order,
    /// Set when the risk path sent the order.
    pub exit: Option<ExitReason>,
}

/// Scores and decision for one entry evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub symbol: String,
    pub human: HumanScore,
    pub ai: f64,
    pub decision: Decision,
}

pub struct TradeEngine {
    broker: Arc<dyn BrokerPort>,
    prices: Arc<dyn PricePort>,
    rules: Arc<dyn RulePort>,
    ledger: Arc<dyn LedgerPort>,
    notifier: Option<Arc<dyn NotifyPort>>,
    book: PositionBook,
    enabled: AtomicBool,
    ladder: RwLock<TakeProfitLadder>,
    symbol_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    pending: Mutex<HashMap<String, PendingOrder>>,
    price_timeframe: String,
}

impl TradeEngine {
    pub fn new(
        broker: Arc<dyn BrokerPort>,
        prices: Arc<dyn PricePort>,
        rules: Arc<dyn RulePort>,
        ledger: Arc<dyn LedgerPort>,
    ) -> Self {
        TradeEngine {
            broker,
            prices,
            rules,
            ledger,
            notifier: None,
            book: PositionBook::new(),
            enabled: AtomicBool::new(false),
            ladder: RwLock::new(TakeProfitLadder::default()),
            symbol_locks: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            price_timeframe: "1m".to_string(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotifyPort>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Timeframe whose latest close is used as the last price.
    pub fn with_price_timeframe(mut self, timeframe: impl Into<String>) -> Self {
        self.price_timeframe = timeframe.into();
        self
    }

    pub fn start(&self) {
        self.enabled.store(true, Ordering::SeqCst);
        log::info!("automated risk management started");
    }

    pub fn stop(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        log::info!("automated risk management stopped");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_take_profits(&self, ladder: TakeProfitLadder) {
        log::info!("take-profit ladder set to [{ladder}]");
        *self.ladder.write().unwrap_or_else(PoisonError::into_inner) = ladder;
    }

    pub fn take_profits(&self) -> TakeProfitLadder {
        self.ladder.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn position(&self, symbol: &str) -> Position {
        self.book.get(symbol)
    }

    /// Open positions ordered by symbol.
    pub fn positions(&self) -> Vec<Position> {
        self.book.positions()
    }

    pub fn decide(&self, human: f64, ai: f64, buy_threshold: u8, sell_threshold: u8) -> Decision {
        decide(human, ai, buy_threshold, sell_threshold)
    }

    fn notify(&self, text: &str) {
        if let Some(notifier) = &self.notifier {
            notifier.send(text);
        }
    }

    fn symbol_lock(&self, symbol: &str) -> Arc<Mutex<()>> {
        let mut locks = self.symbol_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(symbol.to_string()).or_default())
    }

    fn pending_lock(&self) -> MutexGuard<'_, HashMap<String, PendingOrder>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Orders accepted by the broker and not yet filled or canceled, oldest first.
    pub fn pending_orders(&self) -> Vec<PendingOrder> {
        let mut out: Vec<PendingOrder> = self.pending_lock().values().cloned().collect();
        out.sort_by(|a, b| {
            (a.order.timestamp, &a.order.order_id).cmp(&(b.order.timestamp, &b.order.order_id))
        });
        out
    }

    fn pending_exit(&self, symbol: &str) -> Option<String> {
        self.pending_lock()
            .values()
            .find(|p| p.exit.is_some() && p.order.symbol == symbol)
            .map(|p| p.order.order_id.clone())
    }

    fn last_price(&self, symbol: &str) -> Option<f64> {
        match self.prices.last_price(symbol, &self.price_timeframe) {
            Ok(Some(p)) if p.is_finite() && p > 0.0 => Some(p),
            Ok(_) => {
                log::debug!("{symbol}: no last price on {}", self.price_timeframe);
                None
            }
            Err(e) => {
                log::warn!("{symbol}: last price unavailable: {e}");
                None
            }
        }
    }

    /// Submit an order and reconcile the result.
    ///
    /// The order is recorded whatever its status. Only a FILLED order moves
    /// the position and produces a trade record; the position is committed
    /// after the trade is persisted, so any error leaves it untouched. A NEW
    /// order is kept pending until [`TradeEngine::on_order_update`] resolves it.
    pub fn place_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: u64,
        price: Option<f64>,
    ) -> Result<OrderReport, TradefuseError> {
        let lock = self.symbol_lock(symbol);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.place_order_locked(symbol, side, quantity, price, None)
    }

    fn place_order_locked(
        &self,
        symbol: &str,
        side: Side,
        quantity: u64,
        price: Option<f64>,
        exit: Option<ExitReason>,
    ) -> Result<OrderReport, TradefuseError> {
        validate_order(symbol, quantity, price)?;
        let request = OrderRequest {
            symbol: symbol.to_string(),
            side,
            quantity,
            price,
        };
        log::debug!("submitting {side} {symbol} x{quantity} @ {price:?}");
        let receipt = self.broker.place_order(&request).inspect_err(|e| {
            log::error!("order {side} {symbol} x{quantity} failed: {e}");
        })?;

        if receipt.status.is_filled() {
            check_fill_price(symbol, &receipt.order_id, receipt.fill_price)?;
        }

        let order = Order {
            order_id: receipt.order_id.clone(),
            symbol: symbol.to_string(),
            side,
            quantity,
            price: receipt.fill_price,
            status: receipt.status,
            timestamp: Utc::now().timestamp_millis(),
        };
        self.ledger.upsert_order(&order)?;
        log::info!(
            "order {} {side} {symbol} x{quantity} @ {} -> {}",
            order.order_id,
            order.price,
            order.status
        );

        match order.status {
            OrderStatus::Filled => self.record_fill(order),
            OrderStatus::New => {
                self.pending_lock().insert(
                    order.order_id.clone(),
                    PendingOrder {
                        order: order.clone(),
                        exit,
                    },
                );
                Ok(self.unfilled(order))
            }
            OrderStatus::Canceled => Ok(self.unfilled(order)),
        }
    }

    fn unfilled(&self, order: Order) -> OrderReport {
        let position = self.book.get(&order.symbol);
        OrderReport {
            order,
            trade: None,
            position,
        }
    }

    /// Turn a recorded FILLED order into a trade and move the position.
    fn record_fill(&self, order: Order) -> Result<OrderReport, TradefuseError> {
        let signed = i64::try_from(order.quantity).map_err(|_| TradefuseError::InvalidOrder {
            reason: format!("quantity {} out of range for {}", order.quantity, order.symbol),
        })?;
        let (next, realized_pnl) =
            self.book
                .preview_fill(&order.symbol, order.side, order.quantity, order.price);
        let trade = Trade {
            trade_id: Uuid::new_v4().to_string(),
            order_id: order.order_id.clone(),
            symbol: order.symbol.clone(),
            quantity: match order.side {
                Side::Buy => signed,
                Side::Sell => -signed,
            },
            price: order.price,
            realized_pnl,
            timestamp: order.timestamp,
        };
        self.ledger.upsert_trade(&trade)?;
        self.book.commit(next.clone());

        self.notify(&format!(
            "FILLED {} {} x{} @ {:.2} (pnl {:.2}, holding {})",
            order.side, order.symbol, order.quantity, trade.price, trade.realized_pnl, next.quantity
        ));
        Ok(OrderReport {
            order,
            trade: Some(trade),
            position: next,
        })
    }

    /// Resolve a pending order from a later broker update.
    ///
    /// FILLED reconciles the fill at `fill_price`, CANCELED records the
    /// cancellation and re-arms a pending take-profit rung. A NEW update or an
    /// unknown order id changes nothing and yields `None`. On error the order
    /// stays pending so the update can be retried.
    pub fn on_order_update(
        &self,
        order_id: &str,
        status: OrderStatus,
        fill_price: f64,
    ) -> Result<Option<OrderReport>, TradefuseError> {
        let Some(symbol) = self
            .pending_lock()
            .get(order_id)
            .map(|p| p.order.symbol.clone())
        else {
            log::warn!("update {status} for unknown order {order_id} ignored");
            return Ok(None);
        };
        let lock = self.symbol_lock(&symbol);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(pending) = self.pending_lock().remove(order_id) else {
            return Ok(None);
        };
        let result = match status {
            OrderStatus::New => Ok(None),
            OrderStatus::Canceled => self.resolve_canceled(&pending).map(Some),
            OrderStatus::Filled => self.resolve_filled(&pending, fill_price).map(Some),
        };
        if status == OrderStatus::New || result.is_err() {
            self.pending_lock().insert(order_id.to_string(), pending);
        }
        result
    }

    fn resolve_canceled(&self, pending: &PendingOrder) -> Result<OrderReport, TradefuseError> {
        let order = Order {
            status: OrderStatus::Canceled,
            timestamp: Utc::now().timestamp_millis(),
            ..pending.order.clone()
        };
        self.ledger.upsert_order(&order)?;
        if let Some(ExitReason::TakeProfit { level_x100 }) = pending.exit {
            self.book.rearm(&order.symbol, level_x100);
        }
        log::info!("order {} {} {} canceled", order.order_id, order.side, order.symbol);
        Ok(self.unfilled(order))
    }

    fn resolve_filled(&self, pending: &PendingOrder, fill_price: f64) -> Result<OrderReport, TradefuseError> {
        check_fill_price(&pending.order.symbol, &pending.order.order_id, fill_price)?;
        let order = Order {
            price: fill_price,
            status: OrderStatus::Filled,
            timestamp: Utc::now().timestamp_millis(),
            ..pending.order.clone()
        };
        self.ledger.upsert_order(&order)?;
        log::info!(
            "order {} {} {} x{} filled @ {fill_price}",
            order.order_id,
            order.side,
            order.symbol,
            order.quantity
        );
        self.record_fill(order)
    }

    fn execute_intent(&self, symbol: &str, price: f64, intent: SellIntent) -> Result<OrderReport, TradefuseError> {
        log::warn!(
            "{symbol}: {} triggered at {price}, selling {}",
            intent.reason,
            intent.quantity
        );
        self.place_order_locked(symbol, Side::Sell, intent.quantity, None, Some(intent.reason))
    }

    fn stop_loss_locked(&self, symbol: &str, price: f64, stop_pct: f64) -> Result<Option<OrderReport>, TradefuseError> {
        match check_stop_loss(&self.book.get(symbol), price, stop_pct) {
            Some(intent) => self.execute_intent(symbol, price, intent).map(Some),
            None => Ok(None),
        }
    }

    fn trailing_stop_locked(&self, symbol: &str, price: f64, trail_pct: f64) -> Result<Option<OrderReport>, TradefuseError> {
        if !self.book.get(symbol).is_open() {
            return Ok(None);
        }
        let position = self.book.observe_price(symbol, price);
        match check_trailing_stop(&position, price, trail_pct) {
            Some(intent) => self.execute_intent(symbol, price, intent).map(Some),
            None => Ok(None),
        }
    }

    /// Sells reached rungs into `reports`, stopping at the first unfilled one.
    fn take_profits_locked(&self, symbol: &str, price: f64, reports: &mut Vec<OrderReport>) -> Result<(), TradefuseError> {
        let ladder = self.take_profits();
        for rung in ladder.rungs() {
            let Some(intent) = check_take_profit(&self.book.get(symbol), price, rung) else {
                continue;
            };
            let report = self.execute_intent(symbol, price, intent)?;
            let status = report.order.status;
            if status != OrderStatus::Canceled {
                self.book.mark_fired(symbol, rung.level_x100());
            }
            reports.push(report);
            if status != OrderStatus::Filled {
                break;
            }
        }
        Ok(())
    }

    /// Stop-loss, then trailing stop, then take-profit, each seeing the
    /// position left by the previous one. An exit that did not fill ends the pass.
    fn risk_pass_locked(
        &self,
        symbol: &str,
        price: f64,
        risk: &RiskSettings,
        reports: &mut Vec<OrderReport>,
    ) -> Result<(), TradefuseError> {
        if let Some(report) = self.stop_loss_locked(symbol, price, risk.stop_loss_pct)? {
            let filled = report.order.status.is_filled();
            reports.push(report);
            if !filled {
                return Ok(());
            }
        }
        if let Some(report) = self.trailing_stop_locked(symbol, price, risk.trailing_stop_pct)? {
            let filled = report.order.status.is_filled();
            reports.push(report);
            if !filled {
                return Ok(());
            }
        }
        self.take_profits_locked(symbol, price, reports)
    }

    /// Full exit if the last price is `stop_pct` or more below average cost.
    pub fn apply_stop_loss(&self, symbol: &str, stop_pct: f64) -> Result<Option<OrderReport>, TradefuseError> {
        let Some(price) = self.last_price(symbol) else {
            return Ok(None);
        };
        let lock = self.symbol_lock(symbol);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.exit_pending(symbol) {
            return Ok(None);
        }
        self.stop_loss_locked(symbol, price, stop_pct)
    }

    /// Ratchet the trailing high and exit fully on a `trail_pct` drawdown from it.
    pub fn apply_trailing_stop(&self, symbol: &str, trail_pct: f64) -> Result<Option<OrderReport>, TradefuseError> {
        let Some(price) = self.last_price(symbol) else {
            return Ok(None);
        };
        let lock = self.symbol_lock(symbol);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.exit_pending(symbol) {
            return Ok(None);
        }
        self.trailing_stop_locked(symbol, price, trail_pct)
    }

    /// Sell into every reached rung of the ladder that has not fired yet.
    ///
    /// A broker error on a later rung is returned after earlier rungs were
    /// already filled; those fills are in the ledger and were announced.
    pub fn apply_take_profits(&self, symbol: &str) -> Result<Vec<OrderReport>, TradefuseError> {
        let Some(price) = self.last_price(symbol) else {
            return Ok(Vec::new());
        };
        let lock = self.symbol_lock(symbol);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut reports = Vec::new();
        if self.exit_pending(symbol) {
            return Ok(reports);
        }
        self.take_profits_locked(symbol, price, &mut reports)?;
        Ok(reports)
    }

    fn exit_pending(&self, symbol: &str) -> bool {
        match self.pending_exit(symbol) {
            Some(order_id) => {
                log::debug!("{symbol}: exit order {order_id} still pending");
                true
            }
            None => false,
        }
    }

    /// One automated tick for `symbol`.
    ///
    /// Returns `Err` only when nothing was reconciled; a failure after earlier
    /// exits filled yields [`TickOutcome::Interrupted`] carrying those reports.
    pub fn run_risk_checks(&self, symbol: &str, risk: &RiskSettings) -> Result<TickOutcome, TradefuseError> {
        if !self.is_enabled() {
            return Ok(TickOutcome::Disabled);
        }
        let lock = self.symbol_lock(symbol);
        let _guard = match lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                log::debug!("{symbol}: order in flight, skipping risk tick");
                return Ok(TickOutcome::Busy);
            }
            Err(TryLockError::Poisoned(p)) => p.into_inner(),
        };
        if self.exit_pending(symbol) {
            return Ok(TickOutcome::Busy);
        }
        if !self.book.get(symbol).is_open() {
            return Ok(TickOutcome::Evaluated(Vec::new()));
        }
        let Some(price) = self.last_price(symbol) else {
            return Ok(TickOutcome::Evaluated(Vec::new()));
        };

        let mut reports = Vec::new();
        match self.risk_pass_locked(symbol, price, risk, &mut reports) {
            Ok(()) => Ok(TickOutcome::Evaluated(reports)),
            Err(e) if reports.is_empty() => Err(e),
            Err(e) => {
                log::error!("{symbol}: risk tick interrupted after {} order(s): {e}", reports.len());
                Ok(TickOutcome::Interrupted {
                    reports,
                    error: e.to_string(),
                })
            }
        }
    }

    /// Human score, AI score and decision for `symbol`. Never fails.
    pub fn assess(&self, symbol: &str, entry: &EntrySettings) -> Assessment {
        let scorer = RationaleScorer::new(self.prices.as_ref(), self.rules.as_ref());
        let human = scorer.score(symbol, &entry.timeframe, entry.profile);
        let ai = ai_score(&entry.features, human.score, entry.posture);
        let decision = decide(human.score, ai, entry.buy_threshold, entry.sell_threshold);
        log::info!(
            "{symbol}: human {:.2} | ai {:.2} -> {} {:.2}",
            human.score,
            ai,
            decision.action,
            decision.final_score
        );
        Assessment {
            symbol: symbol.to_string(),
            human,
            ai,
            decision,
        }
    }

    /// Assess and act: BUY places the configured quantity, SELL closes up to
    /// that quantity of the held position, HOLD does nothing.
    pub fn evaluate_entry(&self, symbol: &str, entry: &EntrySettings) -> Result<(Assessment, Option<OrderReport>), TradefuseError> {
        let assessment = self.assess(symbol, entry);
        self.notify(&format!(
            "{symbol} human {:.2} | ai {:.2} -> {} {:.2}",
            assessment.human.score, assessment.ai, assessment.decision.action, assessment.decision.final_score
        ));
        let report = match assessment.decision.action {
            Action::Buy => Some(self.place_order(symbol, Side::Buy, entry.order_quantity, None)?),
            Action::Sell => {
                let lock = self.symbol_lock(symbol);
                let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
                let held = self.book.get(symbol).quantity;
                if held == 0 {
                    log::info!("{symbol}: SELL decision with no position, nothing to do");
                    None
                } else {
                    let quantity = entry.order_quantity.min(held);
                    Some(self.place_order_locked(symbol, Side::Sell, quantity, None, None)?)
                }
            }
            Action::Hold => None,
        };
        Ok((assessment, report))
    }
}

/// Reject malformed orders before they reach the broker.
fn validate_order(symbol: &str, quantity: u64, price: Option<f64>) -> Result<(), TradefuseError> {
    if symbol.trim().is_empty() {
        return Err(TradefuseError::InvalidOrder {
            reason: "empty symbol".to_string(),
        });
    }
    if quantity == 0 {
        return Err(TradefuseError::InvalidOrder {
            reason: format!("zero quantity for {symbol}"),
        });
    }
    if let Some(p) = price {
        if !(p.is_finite() && p > 0.0) {
            return Err(TradefuseError::InvalidOrder {
                reason: format!("invalid limit price {p} for {symbol}"),
            });
        }
    }
    if i64::try_from(quantity).is_err() {
        return Err(TradefuseError::InvalidOrder {
            reason: format!("quantity {quantity} out of range for {symbol}"),
        });
    }
    Ok(())
}

fn check_fill_price(symbol: &str, order_id: &str, fill_price: f64) -> Result<(), TradefuseError> {
    if fill_price.is_finite() && fill_price > 0.0 {
        Ok(())
    } else {
        Err(TradefuseError::Broker {
            symbol: symbol.to_string(),
            reason: format!("order {order_id} filled without a valid price"),
        })
    }
}
