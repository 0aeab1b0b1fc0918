//! CLI integration tests for configuration loading and service wiring.
//!
//! Tests cover:
//! - Settings loaded from real INI files on disk, defaults and validation errors
//! - CSV-backed services built from the data section
//! - Engine wiring: ladder from config, paper fills, report formatting
//! - SQLite-backed services (default feature)

mod common;

use std::fs;
use std::io::Write;
use std::path::Path;

use common::*;
use tempfile::TempDir;
use tradefuse::cli;
use tradefuse::domain::decision::Action;
use tradefuse::domain::error::TradefuseError;
use tradefuse::domain::order::Side;
use tradefuse::domain::rationale::Profile;
use tradefuse::domain::settings::DataSource;
use tradefuse::ports::price_port::PricePort;
use tradefuse::ports::rule_port::RulePort;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn write_bars_csv(dir: &Path, symbol: &str, bars: &[PriceBar]) {
    let mut out = String::from("ts,open,high,low,close,volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.timestamp, b.open, b.high, b.low, b.close, b.volume
        ));
    }
    fs::write(dir.join(format!("{symbol}_1m.csv")), out).unwrap();
}

fn csv_ini(bars_dir: &Path, extra: &str) -> String {
    format!(
        r#"
[engine]
symbols = A005930, B000660
timeframe = 1m
profile = scalp
ai_mode = Aggressive
buy_threshold = 65
sell_threshold = 35
order_quantity = 10

[risk]
stop_loss_pct = 3
trailing_stop_pct = 2
take_profit = 2@0.5,5@0.5

[data]
source = csv
bars_dir = {}
{extra}
"#,
        bars_dir.display()
    )
}

mod config_loading {
    use super::*;
    use tradefuse::domain::ai_score::RiskPosture;

    #[test]
    fn full_config_is_parsed() {
        let dir = TempDir::new().unwrap();
        let ini = write_temp_ini(&csv_ini(dir.path(), ""));
        let settings = cli::load_settings(ini.path()).unwrap();

        assert_eq!(settings.symbols, vec!["A005930", "B000660"]);
        assert_eq!(settings.entry.profile, Profile::Scalp);
        assert_eq!(settings.entry.posture, RiskPosture::Aggressive);
        assert_eq!(settings.entry.buy_threshold, 65);
        assert_eq!(settings.entry.sell_threshold, 35);
        assert_eq!(settings.take_profit.to_string(), "2@0.5,5@0.5");
        assert_eq!(settings.data.source, DataSource::Csv);
        assert!(settings.auto_apply);
        assert!(!settings.auto_entry);
    }

    #[test]
    fn defaults_fill_missing_keys() {
        let dir = TempDir::new().unwrap();
        let ini = write_temp_ini(&format!("[data]\nbars_dir = {}\n", dir.path().display()));
        let settings = cli::load_settings(ini.path()).unwrap();

        assert!(settings.symbols.is_empty());
        assert_eq!(settings.entry.buy_threshold, 70);
        assert_eq!(settings.entry.sell_threshold, 40);
        assert_eq!(settings.entry.order_quantity, 10);
        assert_eq!(settings.risk.stop_loss_pct, 3.0);
        assert_eq!(settings.take_profit.rungs().len(), 3);
        assert_eq!(settings.tick_interval.as_millis(), 1500);
    }

    #[test]
    fn missing_file_is_a_parse_error() {
        let err = cli::load_settings(Path::new("/nonexistent/tradefuse.ini")).unwrap_err();
        assert!(matches!(err, TradefuseError::ConfigParse { .. }));
    }

    #[test]
    fn csv_source_requires_bars_dir() {
        let ini = write_temp_ini("[engine]\nsymbols = A005930\n");
        let err = cli::load_settings(ini.path()).unwrap_err();
        assert!(matches!(
            err,
            TradefuseError::ConfigMissing { ref section, ref key } if section == "data" && key == "bars_dir"
        ));
    }

    #[test]
    fn bad_ladder_points_at_the_error() {
        let dir = TempDir::new().unwrap();
        let ini = write_temp_ini(&csv_ini(dir.path(), "").replace("2@0.5,5@0.5", "2@0.5,5"));
        let err = cli::load_settings(ini.path()).unwrap_err();
        match err {
            TradefuseError::ConfigInvalid { section, key, reason } => {
                assert_eq!(section, "risk");
                assert_eq!(key, "take_profit");
                assert!(reason.contains('^'));
            }
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let dir = TempDir::new().unwrap();
        let ini = write_temp_ini(&csv_ini(dir.path(), "").replace("buy_threshold = 65", "buy_threshold = 150"));
        let err = cli::load_settings(ini.path()).unwrap_err();
        assert!(matches!(err, TradefuseError::ConfigInvalid { ref key, .. } if key == "buy_threshold"));
    }

    #[test]
    fn unknown_profile_rejected() {
        let dir = TempDir::new().unwrap();
        let ini = write_temp_ini(&csv_ini(dir.path(), "").replace("profile = scalp", "profile = swing"));
        assert!(matches!(
            cli::load_settings(ini.path()).unwrap_err(),
            TradefuseError::ConfigInvalid { .. }
        ));
    }
}

mod csv_services {
    use super::*;

    fn seeded_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        write_bars_csv(dir.path(), SYMBOL, &uptrend(SYMBOL, 80));
        fs::write(
            dir.path().join("rules.csv"),
            "profile,idx,name,weight,note\nscalp,1,mid_trend,100,trend filter\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn services_read_bars_and_default_rules_path() {
        let dir = seeded_dir();
        let settings = cli::load_settings(write_temp_ini(&csv_ini(dir.path(), "")).path()).unwrap();
        let services = cli::build_services(&settings.data).unwrap();

        let bars = services.prices.query(SYMBOL, "1m").unwrap();
        assert_eq!(bars.len(), 80);
        assert!(services.prices.query("B000660", "1m").unwrap().is_empty());
        assert_eq!(services.rules.get_weights(Profile::Scalp).unwrap().len(), 1);
        assert!(services.rules.get_weights(Profile::Mid).unwrap().is_empty());
    }

    #[test]
    fn engine_takes_ladder_from_config_and_fills_on_paper() {
        let dir = seeded_dir();
        let settings = cli::load_settings(write_temp_ini(&csv_ini(dir.path(), "")).path()).unwrap();
        let engine = cli::build_engine(&settings).unwrap();
        assert_eq!(engine.take_profits(), settings.take_profit);

        let (assessment, report) = engine.evaluate_entry(SYMBOL, &settings.entry).unwrap();
        assert_eq!(assessment.decision.action, Action::Buy);
        let report = report.unwrap();
        let last_close = uptrend(SYMBOL, 80).last().unwrap().close;
        assert!((report.order.price - last_close).abs() < 1e-9);

        let line = cli::format_report(&report);
        assert!(line.contains("BUY A005930 x10"));
        assert!(line.contains("FILLED"));
        assert!(line.contains("position 10"));

        let summary = cli::format_assessment(&assessment);
        assert!(summary.starts_with("A005930 human 100.00"));
        assert!(summary.contains("mid_trend"));
    }

    #[test]
    fn paper_market_order_without_data_is_canceled() {
        let dir = seeded_dir();
        let settings = cli::load_settings(write_temp_ini(&csv_ini(dir.path(), "")).path()).unwrap();
        let engine = cli::build_engine(&settings).unwrap();

        let report = engine.place_order("B000660", Side::Buy, 5, None).unwrap();
        assert!(report.trade.is_none());
        assert!(!engine.position("B000660").is_open());
    }

    #[test]
    fn explicit_rules_path_overrides_default() {
        let dir = seeded_dir();
        let other = dir.path().join("other_rules.csv");
        fs::write(&other, "profile,idx,name,weight\nmid,1,macd_golden_cross,50\n").unwrap();
        let extra = format!("rules_path = {}", other.display());
        let settings = cli::load_settings(write_temp_ini(&csv_ini(dir.path(), &extra)).path()).unwrap();
        let services = cli::build_services(&settings.data).unwrap();

        assert!(services.rules.get_weights(Profile::Scalp).unwrap().is_empty());
        assert_eq!(services.rules.get_weights(Profile::Mid).unwrap().len(), 1);
    }
}

#[cfg(feature = "sqlite")]
mod sqlite_services {
    use super::*;
    use tradefuse::adapters::sqlite_adapter::SqliteAdapter;
    use tradefuse::domain::rationale::{RationaleItem, RationaleWeight};

    fn sqlite_ini(db: &Path) -> String {
        format!(
            "[engine]\nsymbols = {SYMBOL}\n\n[data]\nsource = sqlite\n\n[sqlite]\npath = {}\npool_size = 2\n",
            db.display()
        )
    }

    #[test]
    fn sqlite_source_requires_path() {
        let ini = write_temp_ini("[data]\nsource = sqlite\n");
        assert!(matches!(
            cli::load_settings(ini.path()).unwrap_err(),
            TradefuseError::ConfigMissing { ref section, .. } if section == "sqlite"
        ));
    }

    #[test]
    fn services_share_one_database() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("tradefuse.db");
        let settings = cli::load_settings(write_temp_ini(&sqlite_ini(&db)).path()).unwrap();

        let seed = SqliteAdapter::from_settings(&settings.data).unwrap();
        seed.initialize_schema().unwrap();
        seed.insert_bars(&uptrend(SYMBOL, 40)).unwrap();
        seed.replace_rationale(
            &[RationaleItem {
                id: 1,
                name: "mid_trend".into(),
                note: String::new(),
                order_idx: 1,
            }],
            &[RationaleWeight {
                profile: Profile::Scalp,
                item_id: 1,
                weight: 100.0,
            }],
        )
        .unwrap();

        let services = cli::build_services(&settings.data).unwrap();
        assert_eq!(services.prices.query(SYMBOL, "1m").unwrap().len(), 40);
        assert_eq!(services.rules.get_weights(Profile::Scalp).unwrap().len(), 1);

        let engine = cli::build_engine(&settings).unwrap();
        engine.place_order(SYMBOL, Side::Buy, 3, Some(100.0)).unwrap();
        engine.place_order(SYMBOL, Side::Sell, 1, Some(110.0)).unwrap();

        assert_eq!(seed.list_orders(Some(SYMBOL)).unwrap().len(), 2);
        let trades = seed.list_trades(Some(SYMBOL)).unwrap();
        assert_eq!(trades.len(), 2);
        assert!(trades.iter().any(|t| t.quantity == -1 && (t.realized_pnl - 10.0).abs() < 1e-9));
    }
}
