//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::csv_adapter::{CsvPriceAdapter, CsvRuleAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::log_notifier::LogNotifier;
use crate::adapters::memory_ledger::MemoryLedger;
use crate::adapters::paper_broker::PaperBroker;
use crate::domain::condition::ConditionEvaluator;
use crate::domain::error::TradefuseError;
use crate::domain::order::Side;
use crate::domain::scheduler::Ticker;
use crate::domain::settings::{DataSettings, DataSource, EngineSettings};
use crate::domain::trade_engine::{Assessment, OrderReport, TickOutcome, TradeEngine};
use crate::ports::ledger_port::LedgerPort;
use crate::ports::price_port::PricePort;
use crate::ports::rule_port::RulePort;

#[derive(Parser, Debug)]
#[command(name = "tradefuse", about = "Signal fusion and position risk engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Score symbols and show the BUY/SELL/HOLD decision
    Evaluate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        /// Place the decided order through the paper broker
        #[arg(long)]
        execute: bool,
    },
    /// Show the tail of a preset's signal series
    Signals {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        /// scalp, day or mid (defaults to the configured profile)
        #[arg(long)]
        preset: Option<String>,
        #[arg(long, default_value_t = 20)]
        last: usize,
    },
    /// Place a manual order
    Order {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        side: Side,
        #[arg(long)]
        qty: u64,
        #[arg(long)]
        price: Option<f64>,
    },
    /// Start the engine and tick risk checks (and entries when auto_entry is set)
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<u64>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List persisted orders, trades and daily settlement
    Ledger {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Create the sqlite schema
    InitDb {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Load bars from a CSV file into sqlite
    ImportBars {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        timeframe: String,
    },
    /// Replace the rationale rules in sqlite from a CSV file
    ImportRules {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        csv: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Evaluate {
            config,
            symbol,
            execute,
        } => run_evaluate(&config, symbol.as_deref(), execute),
        Command::Signals {
            config,
            symbol,
            preset,
            last,
        } => run_signals(&config, &symbol, preset.as_deref(), last),
        Command::Order {
            config,
            symbol,
            side,
            qty,
            price,
        } => run_order(&config, &symbol, side, qty, price),
        Command::Run { config, ticks } => run_engine(&config, ticks),
        Command::Validate { config } => run_validate(&config),
        Command::Ledger { config, symbol } => run_ledger(&config, symbol.as_deref()),
        Command::InitDb { config } => run_init_db(&config),
        Command::ImportBars {
            config,
            csv,
            symbol,
            timeframe,
        } => run_import_bars(&config, &csv, &symbol, &timeframe),
        Command::ImportRules { config, csv } => run_import_rules(&config, &csv),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_settings(path: &Path) -> Result<EngineSettings, TradefuseError> {
    eprintln!("Loading config from {}", path.display());
    let config = FileConfigAdapter::from_file(path)?;
    EngineSettings::from_config(&config)
}

/// Ports selected from the data settings.
pub struct Services {
    pub prices: Arc<dyn PricePort>,
    pub rules: Arc<dyn RulePort>,
    pub ledger: Arc<dyn LedgerPort>,
}

#[cfg(feature = "sqlite")]
fn open_sqlite(data: &DataSettings) -> Result<Arc<crate::adapters::sqlite_adapter::SqliteAdapter>, TradefuseError> {
    let adapter = crate::adapters::sqlite_adapter::SqliteAdapter::from_settings(data)?;
    adapter.initialize_schema()?;
    Ok(Arc::new(adapter))
}

pub fn build_services(data: &DataSettings) -> Result<Services, TradefuseError> {
    #[cfg(feature = "sqlite")]
    let sqlite = match &data.sqlite_path {
        Some(_) => Some(open_sqlite(data)?),
        None => None,
    };

    #[cfg(feature = "sqlite")]
    let ledger: Arc<dyn LedgerPort> = match &sqlite {
        Some(db) => Arc::clone(db) as Arc<dyn LedgerPort>,
        None => Arc::new(MemoryLedger::new()),
    };
    #[cfg(not(feature = "sqlite"))]
    let ledger: Arc<dyn LedgerPort> = Arc::new(MemoryLedger::new());

    match data.source {
        DataSource::Csv => {
            let bars_dir = data.bars_dir.clone().unwrap_or_else(|| PathBuf::from("."));
            let rules_path = data
                .rules_path
                .clone()
                .unwrap_or_else(|| bars_dir.join("rules.csv"));
            Ok(Services {
                prices: Arc::new(CsvPriceAdapter::new(bars_dir)),
                rules: Arc::new(CsvRuleAdapter::new(rules_path)),
                ledger,
            })
        }
        DataSource::Sqlite => {
            #[cfg(feature = "sqlite")]
            {
                let db = match sqlite {
                    Some(db) => db,
                    None => open_sqlite(data)?,
                };
                Ok(Services {
                    prices: db.clone(),
                    rules: db,
                    ledger,
                })
            }
            #[cfg(not(feature = "sqlite"))]
            {
                Err(TradefuseError::ConfigInvalid {
                    section: "data".into(),
                    key: "source".into(),
                    reason: "built without sqlite support".into(),
                })
            }
        }
    }
}

/// Engine over the configured ports with a paper broker and log notifications.
pub fn build_engine(settings: &EngineSettings) -> Result<TradeEngine, TradefuseError> {
    let services = build_services(&settings.data)?;
    let broker = Arc::new(PaperBroker::new(
        Arc::clone(&services.prices),
        settings.price_timeframe.clone(),
    ));
    let engine = TradeEngine::new(broker, services.prices, services.rules, services.ledger)
        .with_notifier(Arc::new(LogNotifier))
        .with_price_timeframe(settings.price_timeframe.clone());
    engine.set_take_profits(settings.take_profit.clone());
    Ok(engine)
}

fn target_symbols(settings: &EngineSettings, symbol: Option<&str>) -> Result<Vec<String>, TradefuseError> {
    match symbol {
        Some(s) => Ok(vec![s.to_string()]),
        None if !settings.symbols.is_empty() => Ok(settings.symbols.clone()),
        None => Err(TradefuseError::ConfigMissing {
            section: "engine".into(),
            key: "symbols".into(),
        }),
    }
}

pub fn format_assessment(a: &Assessment) -> String {
    let mut out = format!(
        "{} human {:.2} | ai {:.2} -> {} {:.2}",
        a.symbol, a.human.score, a.ai, a.decision.action, a.decision.final_score
    );
    for (rule, hit) in &a.human.detail {
        out.push_str(&format!("\n  {rule:<24} {hit:.0}"));
    }
    out
}

pub fn format_report(r: &OrderReport) -> String {
    let mut out = format!(
        "order {} {} {} x{} @ {:.2} {}",
        r.order.order_id, r.order.side, r.order.symbol, r.order.quantity, r.order.price, r.order.status
    );
    if let Some(t) = &r.trade {
        out.push_str(&format!(" | trade {} qty {} pnl {:.2}", t.trade_id, t.quantity, t.realized_pnl));
    }
    out.push_str(&format!(
        " | position {} @ {:.2} upnl {:.2}",
        r.position.quantity,
        r.position.average_cost,
        r.position.unrealized_pnl(r.order.price)
    ));
    out
}

fn run_evaluate(config_path: &Path, symbol: Option<&str>, execute: bool) -> Result<(), TradefuseError> {
    let settings = load_settings(config_path)?;
    let symbols = target_symbols(&settings, symbol)?;
    let engine = build_engine(&settings)?;
    for sym in &symbols {
        if execute {
            let (assessment, report) = engine.evaluate_entry(sym, &settings.entry)?;
            println!("{}", format_assessment(&assessment));
            match report {
                Some(r) => println!("{}", format_report(&r)),
                None => println!("  no order placed"),
            }
        } else {
            println!("{}", format_assessment(&engine.assess(sym, &settings.entry)));
        }
    }
    Ok(())
}

fn run_signals(config_path: &Path, symbol: &str, preset: Option<&str>, last: usize) -> Result<(), TradefuseError> {
    let settings = load_settings(config_path)?;
    let services = build_services(&settings.data)?;
    let preset = preset
        .map(str::to_string)
        .unwrap_or_else(|| settings.entry.profile.to_string());
    let evaluator = ConditionEvaluator::new(services.prices.as_ref());
    let signals = evaluator.evaluate(symbol, &settings.entry.timeframe, &preset);
    if signals.is_empty() {
        eprintln!("No signals for {symbol} ({preset}): unknown preset or no data");
        return Ok(());
    }
    let start = signals.len().saturating_sub(last);
    for (i, hit) in signals.iter().enumerate().skip(start) {
        println!("{i}\t{}", u8::from(*hit));
    }
    let fired = signals.iter().filter(|s| **s).count();
    eprintln!("{fired} of {} bars signal for preset {preset}", signals.len());
    Ok(())
}

fn run_order(
    config_path: &Path,
    symbol: &str,
    side: Side,
    qty: u64,
    price: Option<f64>,
) -> Result<(), TradefuseError> {
    let settings = load_settings(config_path)?;
    let engine = build_engine(&settings)?;
    let report = engine.place_order(symbol, side, qty, price)?;
    println!("{}", format_report(&report));
    Ok(())
}

fn run_engine(config_path: &Path, ticks: Option<u64>) -> Result<(), TradefuseError> {
    let settings = load_settings(config_path)?;
    let symbols = target_symbols(&settings, None)?;
    let engine = Arc::new(build_engine(&settings)?);
    engine.start();
    eprintln!(
        "Running {} symbol(s) every {} ms",
        symbols.len(),
        settings.tick_interval.as_millis()
    );

    let tick_engine = Arc::clone(&engine);
    let entry = settings.entry.clone();
    let risk = settings.risk;
    let auto_entry = settings.auto_entry;
    let auto_apply = settings.auto_apply;
    let ticker = Ticker::spawn(settings.tick_interval, move |n| {
        for symbol in &symbols {
            if auto_apply {
                match tick_engine.run_risk_checks(symbol, &risk) {
                    Ok(TickOutcome::Evaluated(reports)) => {
                        for r in &reports {
                            println!("{}", format_report(r));
                        }
                    }
                    Ok(TickOutcome::Interrupted { reports, error }) => {
                        for r in &reports {
                            println!("{}", format_report(r));
                        }
                        log::error!("tick {n} {symbol}: risk check interrupted: {error}");
                    }
                    Ok(outcome) => log::debug!("tick {n} {symbol}: {outcome:?}"),
                    Err(e) => log::error!("tick {n} {symbol}: risk check failed: {e}"),
                }
            }
            if auto_entry {
                match tick_engine.evaluate_entry(symbol, &entry) {
                    Ok((_, Some(r))) => println!("{}", format_report(&r)),
                    Ok((_, None)) => {}
                    Err(e) => log::error!("tick {n} {symbol}: entry failed: {e}"),
                }
            }
        }
        ticks.is_none_or(|limit| n < limit)
    });
    let done = ticker.join();
    engine.stop();

    eprintln!("Stopped after {done} tick(s)");
    for p in engine.positions() {
        println!(
            "position {} qty {} avg {:.2} cost {:.2} high {}",
            p.symbol,
            p.quantity,
            p.average_cost,
            p.market_value(p.average_cost),
            p.trailing_high.map_or("-".to_string(), |h| format!("{h:.2}"))
        );
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), TradefuseError> {
    let s = load_settings(config_path)?;
    println!("symbols:          {}", s.symbols.join(", "));
    println!("timeframe:        {}", s.entry.timeframe);
    println!("profile:          {}", s.entry.profile);
    println!("ai mode:          {}", s.entry.posture);
    println!(
        "thresholds:       buy >= {}, sell <= {}",
        s.entry.buy_threshold, s.entry.sell_threshold
    );
    println!("order quantity:   {}", s.entry.order_quantity);
    println!("tick interval:    {} ms", s.tick_interval.as_millis());
    println!("auto entry:       {}", s.auto_entry);
    println!("auto risk:        {}", s.auto_apply);
    println!("stop loss:        {}%", s.risk.stop_loss_pct);
    println!("trailing stop:    {}%", s.risk.trailing_stop_pct);
    println!("take profit:      {}", s.take_profit);
    println!(
        "data source:      {}",
        match s.data.source {
            DataSource::Csv => "csv",
            DataSource::Sqlite => "sqlite",
        }
    );
    eprintln!("Configuration is valid");
    Ok(())
}

#[cfg(feature = "sqlite")]
fn sqlite_only(config_path: &Path) -> Result<Arc<crate::adapters::sqlite_adapter::SqliteAdapter>, TradefuseError> {
    let settings = load_settings(config_path)?;
    open_sqlite(&settings.data)
}

#[cfg(not(feature = "sqlite"))]
fn sqlite_unavailable() -> TradefuseError {
    TradefuseError::Database {
        reason: "built without sqlite support".into(),
    }
}

fn run_ledger(config_path: &Path, symbol: Option<&str>) -> Result<(), TradefuseError> {
    #[cfg(feature = "sqlite")]
    {
        use crate::domain::settlement::daily_pnl;

        let db = sqlite_only(config_path)?;
        let orders = db.list_orders(symbol)?;
        let trades = db.list_trades(symbol)?;
        println!("Orders ({}):", orders.len());
        for o in &orders {
            println!(
                "  {} {} {} {} x{} @ {:.2} {}",
                o.timestamp, o.order_id, o.side, o.symbol, o.quantity, o.price, o.status
            );
        }
        println!("Trades ({}):", trades.len());
        for t in &trades {
            println!(
                "  {} {} {} qty {} @ {:.2} pnl {:.2}",
                t.timestamp, t.trade_id, t.symbol, t.quantity, t.price, t.realized_pnl
            );
        }
        println!("Daily settlement:");
        for d in daily_pnl(&trades) {
            println!(
                "  {} {} net {} pnl {:.2}",
                d.date, d.symbol, d.net_quantity, d.realized_pnl
            );
        }
        Ok(())
    }
    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config_path, symbol);
        Err(sqlite_unavailable())
    }
}

fn run_init_db(config_path: &Path) -> Result<(), TradefuseError> {
    #[cfg(feature = "sqlite")]
    {
        sqlite_only(config_path)?;
        eprintln!("Schema ready");
        Ok(())
    }
    #[cfg(not(feature = "sqlite"))]
    {
        let _ = config_path;
        Err(sqlite_unavailable())
    }
}

fn run_import_bars(config_path: &Path, csv: &Path, symbol: &str, timeframe: &str) -> Result<(), TradefuseError> {
    #[cfg(feature = "sqlite")]
    {
        let db = sqlite_only(config_path)?;
        let bars = crate::adapters::csv_adapter::read_bars(csv, symbol, timeframe)?;
        if bars.is_empty() {
            return Err(TradefuseError::NoData {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            });
        }
        let n = db.insert_bars(&bars)?;
        eprintln!("Imported {n} bars for {symbol} ({timeframe})");
        Ok(())
    }
    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config_path, csv, symbol, timeframe);
        Err(sqlite_unavailable())
    }
}

fn run_import_rules(config_path: &Path, csv: &Path) -> Result<(), TradefuseError> {
    #[cfg(feature = "sqlite")]
    {
        let db = sqlite_only(config_path)?;
        let (items, weights) = crate::adapters::csv_adapter::read_rationale(csv)?;
        db.replace_rationale(&items, &weights)?;
        eprintln!("Imported {} rules, {} weights", items.len(), weights.len());
        Ok(())
    }
    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config_path, csv);
        Err(sqlite_unavailable())
    }
}
