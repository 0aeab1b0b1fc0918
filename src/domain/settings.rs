//! Typed engine settings built and validated from a [`ConfigPort`].

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::ai_score::{MarketFeatures, RiskPosture};
use crate::domain::error::TradefuseError;
use crate::domain::rationale::Profile;
use crate::domain::risk::TakeProfitLadder;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_LADDER: &str = "2@0.3,4@0.3,6@0.4";

/// Inputs to one entry evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySettings {
    pub timeframe: String,
    pub profile: Profile,
    pub posture: RiskPosture,
    pub features: MarketFeatures,
    pub buy_threshold: u8,
    pub sell_threshold: u8,
    pub order_quantity: u64,
}

impl Default for EntrySettings {
    fn default() -> Self {
        Self {
            timeframe: "1m".to_string(),
            profile: Profile::Scalp,
            posture: RiskPosture::Normal,
            features: MarketFeatures {
                volatility: 0.02,
                spread: 0.15,
                momentum: 0.6,
                trend: 0.55,
            },
            buy_threshold: 70,
            sell_threshold: 40,
            order_quantity: 10,
        }
    }
}

/// Stop percentages for one risk tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskSettings {
    pub stop_loss_pct: f64,
    pub trailing_stop_pct: f64,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            stop_loss_pct: 3.0,
            trailing_stop_pct: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Csv,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataSettings {
    pub source: DataSource,
    pub bars_dir: Option<PathBuf>,
    pub rules_path: Option<PathBuf>,
    pub sqlite_path: Option<String>,
    pub pool_size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub symbols: Vec<String>,
    pub price_timeframe: String,
    pub tick_interval: Duration,
    pub auto_entry: bool,
    /// Run stop-loss, trailing stop and take-profit on each tick.
    pub auto_apply: bool,
    pub entry: EntrySettings,
    pub risk: RiskSettings,
    pub take_profit: TakeProfitLadder,
    pub data: DataSettings,
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> TradefuseError {
    TradefuseError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn threshold(config: &dyn ConfigPort, key: &str, default: i64) -> Result<u8, TradefuseError> {
    let value = config.get_int("engine", key, default);
    u8::try_from(value)
        .ok()
        .filter(|v| *v <= 100)
        .ok_or_else(|| invalid("engine", key, format!("{key} must be between 0 and 100, got {value}")))
}

fn non_negative(config: &dyn ConfigPort, section: &str, key: &str, default: f64) -> Result<f64, TradefuseError> {
    let value = config.get_double(section, key, default);
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(section, key, format!("{key} must be non-negative")));
    }
    Ok(value)
}

fn string_or(config: &dyn ConfigPort, section: &str, key: &str, default: &str) -> String {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl EngineSettings {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TradefuseError> {
        let symbols: Vec<String> = config
            .get_string("engine", "symbols")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let profile_name = string_or(config, "engine", "profile", "scalp");
        let profile = profile_name
            .parse::<Profile>()
            .map_err(|reason| invalid("engine", "profile", reason))?;

        let order_quantity = config.get_int("engine", "order_quantity", 10);
        if order_quantity <= 0 {
            return Err(invalid("engine", "order_quantity", "order_quantity must be positive"));
        }
        let tick_ms = config.get_int("engine", "tick_interval_ms", 1500);
        if tick_ms <= 0 {
            return Err(invalid("engine", "tick_interval_ms", "tick_interval_ms must be positive"));
        }

        let defaults = EntrySettings::default();
        let features = MarketFeatures {
            volatility: non_negative(config, "features", "volatility", defaults.features.volatility)?,
            spread: non_negative(config, "features", "spread", defaults.features.spread)?,
            momentum: config.get_double("features", "momentum", defaults.features.momentum),
            trend: config.get_double("features", "trend", defaults.features.trend),
        };

        let entry = EntrySettings {
            timeframe: string_or(config, "engine", "timeframe", "1m"),
            profile,
            posture: RiskPosture::from_mode(&string_or(config, "engine", "ai_mode", "Normal")),
            features,
            buy_threshold: threshold(config, "buy_threshold", 70)?,
            sell_threshold: threshold(config, "sell_threshold", 40)?,
            order_quantity: order_quantity as u64,
        };

        let risk = RiskSettings {
            stop_loss_pct: non_negative(config, "risk", "stop_loss_pct", 3.0)?,
            trailing_stop_pct: non_negative(config, "risk", "trailing_stop_pct", 2.0)?,
        };

        let ladder_text = config
            .get_string("risk", "take_profit")
            .unwrap_or_else(|| DEFAULT_LADDER.to_string());
        let take_profit = ladder_text.parse::<TakeProfitLadder>().map_err(|e| {
            invalid("risk", "take_profit", e.display_with_context(&ladder_text))
        })?;

        let data = DataSettings::from_config(config)?;

        Ok(EngineSettings {
            symbols,
            price_timeframe: string_or(config, "engine", "price_timeframe", "1m"),
            tick_interval: Duration::from_millis(tick_ms as u64),
            auto_entry: config.get_bool("engine", "auto_entry", false),
            auto_apply: config.get_bool("risk", "auto_apply", true),
            entry,
            risk,
            take_profit,
            data,
        })
    }
}

impl DataSettings {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TradefuseError> {
        let source = match string_or(config, "data", "source", "csv").to_ascii_lowercase().as_str() {
            "csv" => DataSource::Csv,
            "sqlite" => DataSource::Sqlite,
            other => {
                return Err(invalid("data", "source", format!("unknown data source '{other}' (expected csv or sqlite)")));
            }
        };
        let pool_size = config.get_int("sqlite", "pool_size", 4);
        if pool_size <= 0 || pool_size > i64::from(u32::MAX) {
            return Err(invalid("sqlite", "pool_size", "pool_size must be positive"));
        }
        let path = |section: &str, key: &str| {
            config
                .get_string(section, key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let settings = DataSettings {
            source,
            bars_dir: path("data", "bars_dir").map(PathBuf::from),
            rules_path: path("data", "rules_path").map(PathBuf::from),
            sqlite_path: path("sqlite", "path"),
            pool_size: pool_size as u32,
        };
        if settings.source == DataSource::Sqlite && config.has_key("data", "rules_path") {
            log::warn!("[data] rules_path is ignored when source = sqlite");
        }
        match settings.source {
            DataSource::Csv if settings.bars_dir.is_none() => Err(TradefuseError::ConfigMissing {
                section: "data".to_string(),
                key: "bars_dir".to_string(),
            }),
            DataSource::Sqlite if settings.sqlite_path.is_none() => Err(TradefuseError::ConfigMissing {
                section: "sqlite".to_string(),
                key: "path".to_string(),
            }),
            _ => Ok(settings),
        }
    }
}
