//! CSV-backed price and rule sources.

use crate::domain::error::TradefuseError;
use crate::domain::price_bar::{PriceBar, normalize_series};
use crate::domain::rationale::{Profile, RationaleItem, RationaleWeight, WeightedRule};
use crate::ports::price_port::PricePort;
use crate::ports::rule_port::RulePort;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

fn csv_err(path: &Path, e: impl std::fmt::Display) -> TradefuseError {
    TradefuseError::Database {
        reason: format!("{}: {}", path.display(), e),
    }
}

fn field<T: std::str::FromStr>(
    record: &csv::StringRecord,
    idx: usize,
    name: &str,
    path: &Path,
) -> Result<T, TradefuseError>
where
    T::Err: std::fmt::Display,
{
    let line = record.position().map(|p| p.line()).unwrap_or(0);
    let raw = record
        .get(idx)
        .ok_or_else(|| csv_err(path, format!("line {line}: missing {name} column")))?;
    raw.parse::<T>()
        .map_err(|e| csv_err(path, format!("line {line}: invalid {name} value '{raw}': {e}")))
}

/// Read `ts,open,high,low,close,volume` rows (header required) as bars of
/// `symbol`/`timeframe`, sorted and deduplicated by timestamp.
pub fn read_bars(path: &Path, symbol: &str, timeframe: &str) -> Result<Vec<PriceBar>, TradefuseError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| csv_err(path, e))?;
    let mut bars = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| csv_err(path, e))?;
        bars.push(PriceBar {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            timestamp: field(&record, 0, "ts", path)?,
            open: field(&record, 1, "open", path)?,
            high: field(&record, 2, "high", path)?,
            low: field(&record, 3, "low", path)?,
            close: field(&record, 4, "close", path)?,
            volume: field(&record, 5, "volume", path)?,
        });
    }
    Ok(normalize_series(bars))
}

/// Price history from a directory of `<SYMBOL>_<TIMEFRAME>.csv` files.
pub struct CsvPriceAdapter {
    base_path: PathBuf,
}

impl CsvPriceAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn csv_path(&self, symbol: &str, timeframe: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}_{timeframe}.csv"))
    }
}

impl PricePort for CsvPriceAdapter {
    /// A missing file is an empty series.
    fn query(&self, symbol: &str, timeframe: &str) -> Result<Vec<PriceBar>, TradefuseError> {
        let path = self.csv_path(symbol, timeframe);
        if !path.exists() {
            log::debug!("no bar file at {}", path.display());
            return Ok(Vec::new());
        }
        read_bars(&path, symbol, timeframe)
    }
}

/// One row of a rules file.
#[derive(Debug, Clone, PartialEq)]
struct RuleRow {
    profile: Profile,
    idx: i64,
    name: String,
    weight: f64,
    note: String,
}

fn read_rule_rows(path: &Path) -> Result<Vec<RuleRow>, TradefuseError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| csv_err(path, e))?;
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| csv_err(path, e))?;
        let weight: f64 = field(&record, 3, "weight", path)?;
        if !(0.0..=100.0).contains(&weight) {
            return Err(csv_err(path, format!("weight {weight} outside 0..=100")));
        }
        rows.push(RuleRow {
            profile: field(&record, 0, "profile", path)?,
            idx: field(&record, 1, "idx", path)?,
            name: field(&record, 2, "name", path)?,
            weight,
            note: record.get(4).unwrap_or_default().to_string(),
        });
    }
    rows.sort_by_key(|r| r.idx);
    Ok(rows)
}

/// Split a rules file into items (one per distinct name, first authoring
/// index wins) and per-profile weights, ready for a wholesale import.
pub fn read_rationale(path: &Path) -> Result<(Vec<RationaleItem>, Vec<RationaleWeight>), TradefuseError> {
    let rows = read_rule_rows(path)?;
    let mut items: Vec<RationaleItem> = Vec::new();
    let mut ids: HashMap<String, i64> = HashMap::new();
    let mut weights = Vec::new();
    for row in rows {
        let id = match ids.get(&row.name) {
            Some(id) => *id,
            None => {
                let id = items.len() as i64 + 1;
                ids.insert(row.name.clone(), id);
                items.push(RationaleItem {
                    id,
                    name: row.name.clone(),
                    note: row.note.clone(),
                    order_idx: row.idx,
                });
                id
            }
        };
        weights.push(RationaleWeight {
            profile: row.profile,
            item_id: id,
            weight: row.weight,
        });
    }
    Ok((items, weights))
}

/// Rule weights from a `profile,idx,name,weight[,note]` file, re-read per call.
pub struct CsvRuleAdapter {
    path: PathBuf,
}

impl CsvRuleAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl RulePort for CsvRuleAdapter {
    /// A missing file means no rules are configured.
    fn get_weights(&self, profile: Profile) -> Result<Vec<WeightedRule>, TradefuseError> {
        if !self.path.exists() {
            log::debug!("no rules file at {}", self.path.display());
            return Ok(Vec::new());
        }
        Ok(read_rule_rows(&self.path)?
            .into_iter()
            .filter(|r| r.profile == profile)
            .map(|r| WeightedRule::new(r.name, r.weight))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup_bars() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();
        let content = "ts,open,high,low,close,volume\n\
            120000,101.0,103.0,100.0,102.0,900\n\
            60000,100.0,102.0,99.0,101.0,1000\n\
            120000,101.0,104.0,100.0,103.5,950\n";
        fs::write(path.join("A005930_1m.csv"), content).unwrap();
        fs::write(path.join("BAD_1m.csv"), "ts,open,high,low,close,volume\nx,1,1,1,1,1\n").unwrap();
        (dir, path)
    }

    #[test]
    fn query_sorts_and_dedups() {
        let (_dir, path) = setup_bars();
        let adapter = CsvPriceAdapter::new(path);
        let bars = adapter.query("A005930", "1m").unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp, 60_000);
        assert_eq!(bars[1].close, 103.5);
        assert_eq!(bars[1].symbol, "A005930");
        assert_eq!(adapter.last_price("A005930", "1m").unwrap(), Some(103.5));
    }

    #[test]
    fn missing_file_is_empty_series() {
        let (_dir, path) = setup_bars();
        let adapter = CsvPriceAdapter::new(path);
        assert!(adapter.query("A005930", "1d").unwrap().is_empty());
        assert_eq!(adapter.last_price("NONE", "1m").unwrap(), None);
    }

    #[test]
    fn malformed_row_is_an_error() {
        let (_dir, path) = setup_bars();
        let adapter = CsvPriceAdapter::new(path);
        let err = adapter.query("BAD", "1m").unwrap_err();
        assert!(err.to_string().contains("invalid ts value"));
    }

    fn setup_rules() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.csv");
        let content = "profile,idx,name,weight,note\n\
            scalp,2,mid_trend,20\n\
            scalp,1,volume_spike,80,big volume\n\
            mid,3,mid_trend,100,trend filter\n";
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn rule_weights_filtered_and_ordered() {
        let (_dir, path) = setup_rules();
        let adapter = CsvRuleAdapter::new(path);
        assert_eq!(
            adapter.get_weights(Profile::Scalp).unwrap(),
            vec![WeightedRule::new("volume_spike", 80.0), WeightedRule::new("mid_trend", 20.0)]
        );
        assert_eq!(adapter.get_weights(Profile::Mid).unwrap().len(), 1);
        assert!(adapter.get_weights(Profile::Day).unwrap().is_empty());
    }

    #[test]
    fn rationale_items_deduplicated_by_name() {
        let (_dir, path) = setup_rules();
        let (items, weights) = read_rationale(&path).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "volume_spike");
        assert_eq!(items[0].note, "big volume");
        assert_eq!(items[1].name, "mid_trend");
        assert_eq!(items[1].order_idx, 2);
        assert_eq!(weights.len(), 3);
        assert_eq!(weights[2].item_id, items[1].id);
        assert_eq!(weights[2].profile, Profile::Mid);
    }

    #[test]
    fn missing_rules_file_is_no_rules() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvRuleAdapter::new(dir.path().join("absent.csv"));
        assert!(adapter.get_weights(Profile::Scalp).unwrap().is_empty());
        assert!(read_rationale(&dir.path().join("absent.csv")).is_err());
    }

    #[test]
    fn rule_weight_out_of_range_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.csv");
        fs::write(&path, "profile,idx,name,weight\nscalp,1,mid_trend,150\n").unwrap();
        assert!(CsvRuleAdapter::new(path).get_weights(Profile::Scalp).is_err());
    }
}
