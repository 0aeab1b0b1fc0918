//! SQLite storage for candles, rationale rules, orders and trades.

use crate::domain::error::TradefuseError;
use crate::domain::order::{Order, Trade};
use crate::domain::price_bar::PriceBar;
use crate::domain::rationale::{Profile, RationaleItem, RationaleWeight, WeightedRule};
use crate::domain::settings::DataSettings;
use crate::ports::ledger_port::LedgerPort;
use crate::ports::price_port::PricePort;
use crate::ports::rule_port::RulePort;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::str::FromStr;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS candles (
        symbol TEXT NOT NULL,
        timeframe TEXT NOT NULL,
        ts INTEGER NOT NULL,
        open REAL NOT NULL,
        high REAL NOT NULL,
        low REAL NOT NULL,
        close REAL NOT NULL,
        volume REAL NOT NULL,
        PRIMARY KEY (symbol, timeframe, ts)
    );
    CREATE TABLE IF NOT EXISTS rationale_items (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        note TEXT NOT NULL DEFAULT '',
        order_idx INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS rationale_weights (
        profile TEXT NOT NULL,
        item_id INTEGER NOT NULL REFERENCES rationale_items(id),
        weight REAL NOT NULL,
        PRIMARY KEY (profile, item_id)
    );
    CREATE TABLE IF NOT EXISTS orders (
        order_id TEXT PRIMARY KEY,
        symbol TEXT NOT NULL,
        side TEXT NOT NULL,
        quantity INTEGER NOT NULL,
        price REAL NOT NULL,
        status TEXT NOT NULL,
        ts INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS trades (
        trade_id TEXT PRIMARY KEY,
        order_id TEXT NOT NULL,
        symbol TEXT NOT NULL,
        quantity INTEGER NOT NULL,
        price REAL NOT NULL,
        pnl REAL NOT NULL,
        ts INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_orders_symbol ON orders(symbol);
    CREATE INDEX IF NOT EXISTS idx_trades_symbol ON trades(symbol);";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_err(e: r2d2::Error) -> TradefuseError {
    TradefuseError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> TradefuseError {
    TradefuseError::DatabaseQuery {
        reason: e.to_string(),
    }
}

/// Parse a TEXT column through `FromStr`, surfacing failures as conversion errors.
fn parse_text<T: FromStr<Err = String>>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    text.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

fn non_negative_u64(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let value: i64 = row.get(idx)?;
    u64::try_from(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Integer, Box::new(e))
    })
}

impl SqliteAdapter {
    pub fn from_settings(settings: &DataSettings) -> Result<Self, TradefuseError> {
        let db_path = settings
            .sqlite_path
            .as_deref()
            .ok_or_else(|| TradefuseError::ConfigMissing {
                section: "sqlite".into(),
                key: "path".into(),
            })?;
        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(settings.pool_size)
            .build(manager)
            .map_err(pool_err)?;
        log::debug!("opened sqlite pool at {db_path} (size {})", settings.pool_size);
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, TradefuseError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(pool_err)?;
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, TradefuseError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), TradefuseError> {
        self.conn()?.execute_batch(SCHEMA).map_err(query_err)
    }

    /// Insert bars keyed by (symbol, timeframe, ts). Bars already stored are
    /// left untouched. Returns the number of rows actually inserted.
    pub fn insert_bars(&self, bars: &[PriceBar]) -> Result<usize, TradefuseError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        let mut inserted = 0;
        for bar in bars {
            inserted += tx.execute(
                "INSERT OR IGNORE INTO candles (symbol, timeframe, ts, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    bar.symbol,
                    bar.timeframe,
                    bar.timestamp,
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(query_err)?;
        }
        tx.commit().map_err(query_err)?;
        Ok(inserted)
    }

    /// Replace every rationale item and weight in one transaction.
    pub fn replace_rationale(
        &self,
        items: &[RationaleItem],
        weights: &[RationaleWeight],
    ) -> Result<(), TradefuseError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        tx.execute_batch("DELETE FROM rationale_weights; DELETE FROM rationale_items;")
            .map_err(query_err)?;
        for item in items {
            tx.execute(
                "INSERT INTO rationale_items (id, name, note, order_idx) VALUES (?1, ?2, ?3, ?4)",
                params![item.id, item.name, item.note, item.order_idx],
            )
            .map_err(query_err)?;
        }
        for w in weights {
            tx.execute(
                "INSERT OR REPLACE INTO rationale_weights (profile, item_id, weight) VALUES (?1, ?2, ?3)",
                params![w.profile.as_str(), w.item_id, w.weight],
            )
            .map_err(query_err)?;
        }
        tx.commit().map_err(query_err)?;
        log::info!(
            "replaced rationale rules: {} items, {} weights",
            items.len(),
            weights.len()
        );
        Ok(())
    }

    pub fn list_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, TradefuseError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT order_id, symbol, side, quantity, price, status, ts FROM orders
                 WHERE ?1 IS NULL OR symbol = ?1
                 ORDER BY ts ASC, order_id ASC",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![symbol], |row| {
                Ok(Order {
                    order_id: row.get(0)?,
                    symbol: row.get(1)?,
                    side: parse_text(row, 2)?,
                    quantity: non_negative_u64(row, 3)?,
                    price: row.get(4)?,
                    status: parse_text(row, 5)?,
                    timestamp: row.get(6)?,
                })
            })
            .map_err(query_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    pub fn list_trades(&self, symbol: Option<&str>) -> Result<Vec<Trade>, TradefuseError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT trade_id, order_id, symbol, quantity, price, pnl, ts FROM trades
                 WHERE ?1 IS NULL OR symbol = ?1
                 ORDER BY ts ASC, trade_id ASC",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![symbol], |row| {
                Ok(Trade {
                    trade_id: row.get(0)?,
                    order_id: row.get(1)?,
                    symbol: row.get(2)?,
                    quantity: row.get(3)?,
                    price: row.get(4)?,
                    realized_pnl: row.get(5)?,
                    timestamp: row.get(6)?,
                })
            })
            .map_err(query_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }
}

impl PricePort for SqliteAdapter {
    fn query(&self, symbol: &str, timeframe: &str) -> Result<Vec<PriceBar>, TradefuseError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT ts, open, high, low, close, volume FROM candles
                 WHERE symbol = ?1 AND timeframe = ?2
                 ORDER BY ts ASC",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![symbol, timeframe], |row| {
                Ok(PriceBar {
                    symbol: symbol.to_string(),
                    timeframe: timeframe.to_string(),
                    timestamp: row.get(0)?,
                    open: row.get(1)?,
                    high: row.get(2)?,
                    low: row.get(3)?,
                    close: row.get(4)?,
                    volume: row.get(5)?,
                })
            })
            .map_err(query_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn last_price(&self, symbol: &str, timeframe: &str) -> Result<Option<f64>, TradefuseError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT close FROM candles WHERE symbol = ?1 AND timeframe = ?2
                 ORDER BY ts DESC LIMIT 1",
            )
            .map_err(query_err)?;
        let mut rows = stmt
            .query_map(params![symbol, timeframe], |row| row.get::<_, f64>(0))
            .map_err(query_err)?;
        rows.next().transpose().map_err(query_err)
    }
}

impl RulePort for SqliteAdapter {
    fn get_weights(&self, profile: Profile) -> Result<Vec<WeightedRule>, TradefuseError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT i.name, w.weight FROM rationale_weights w
                 JOIN rationale_items i ON i.id = w.item_id
                 WHERE w.profile = ?1
                 ORDER BY i.order_idx ASC, i.id ASC",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![profile.as_str()], |row| {
                Ok(WeightedRule::new(row.get::<_, String>(0)?, row.get(1)?))
            })
            .map_err(query_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }
}

impl LedgerPort for SqliteAdapter {
    fn upsert_order(&self, order: &Order) -> Result<(), TradefuseError> {
        let quantity = i64::try_from(order.quantity).map_err(|_| TradefuseError::DatabaseQuery {
            reason: format!("order {} quantity out of range", order.order_id),
        })?;
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO orders (order_id, symbol, side, quantity, price, status, ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    order.order_id,
                    order.symbol,
                    order.side.as_str(),
                    quantity,
                    order.price,
                    order.status.as_str(),
                    order.timestamp
                ],
            )
            .map_err(query_err)?;
        Ok(())
    }

    fn upsert_trade(&self, trade: &Trade) -> Result<(), TradefuseError> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO trades (trade_id, order_id, symbol, quantity, price, pnl, ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    trade.trade_id,
                    trade.order_id,
                    trade.symbol,
                    trade.quantity,
                    trade.price,
                    trade.realized_pnl,
                    trade.timestamp
                ],
            )
            .map_err(query_err)?;
        Ok(())
    }
}
