//! File journal for finished backtests.
//!
//! Each saved backtest gets a sequence number and two files in the journal
//! directory: `<id>_<name>.trades.csv` (one row per executed trade) and
//! `<id>_<name>.json` (the full report). The trades are written first.

use crate::domain::backtest::BacktestReport;
use crate::domain::error::{PersistError, TradesimError};
use crate::domain::position::ExecutedTrade;
use crate::ports::config_port::ConfigPort;
use crate::ports::trade_store_port::{StoredBacktest, TradeStorePort};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct CsvJournalAdapter {
    dir: PathBuf,
}

impl CsvJournalAdapter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// `[journal] path`, or `None` when no journal is configured.
    pub fn from_config(config: &dyn ConfigPort) -> Option<Self> {
        config
            .get_string("journal", "path")
            .filter(|p| !p.trim().is_empty())
            .map(|p| Self::new(PathBuf::from(p.trim())))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn stem(id: u64, name: &str) -> String {
        format!("{:04}_{}", id, sanitize_name(name))
    }

    pub fn report_path(&self, stored: &StoredBacktest) -> PathBuf {
        self.dir.join(format!("{}.json", Self::stem(stored.id, &stored.name)))
    }

    pub fn trades_path(&self, stored: &StoredBacktest) -> PathBuf {
        self.dir
            .join(format!("{}.trades.csv", Self::stem(stored.id, &stored.name)))
    }

    /// One past the highest sequence number already in the journal.
    fn next_id(&self) -> std::io::Result<u64> {
        let mut highest = 0;
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if !name.ends_with(".json") {
                continue;
            }
            if let Some(id) = name.split('_').next().and_then(|n| n.parse::<u64>().ok()) {
                highest = highest.max(id);
            }
        }
        Ok(highest + 1)
    }

    /// Read back the trades of a stored backtest.
    pub fn load_trades(&self, stored: &StoredBacktest) -> Result<Vec<ExecutedTrade>, TradesimError> {
        let path = self.trades_path(stored);
        let mut rdr = csv::Reader::from_path(&path).map_err(|e| TradesimError::DataSchema {
            source_name: path.display().to_string(),
            reason: e.to_string(),
        })?;
        rdr.deserialize()
            .collect::<Result<Vec<ExecutedTrade>, _>>()
            .map_err(|e| TradesimError::DataSchema {
                source_name: path.display().to_string(),
                reason: e.to_string(),
            })
    }

    fn write_trades(&self, stored: &StoredBacktest, trades: &[ExecutedTrade]) -> Result<(), PersistError> {
        let path = self.trades_path(stored);
        let mut wtr = csv::Writer::from_path(&path).map_err(|e| PersistError::Backtest {
            name: stored.name.clone(),
            reason: format!("failed to create {}: {}", path.display(), e),
        })?;

        for trade in trades {
            wtr.serialize(trade).map_err(|e| PersistError::Trade {
                trade: Box::new(trade.clone()),
                reason: e.to_string(),
            })?;
        }

        wtr.flush().map_err(|e| PersistError::Backtest {
            name: stored.name.clone(),
            reason: format!("failed to flush {}: {}", path.display(), e),
        })
    }
}

/// File-name-safe form of a backtest name.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl TradeStorePort for CsvJournalAdapter {
    fn save_backtest(&self, report: &BacktestReport) -> Result<StoredBacktest, PersistError> {
        let backtest_err = |reason: String| PersistError::Backtest {
            name: report.name.clone(),
            reason,
        };

        fs::create_dir_all(&self.dir)
            .map_err(|e| backtest_err(format!("failed to create {}: {}", self.dir.display(), e)))?;
        let id = self
            .next_id()
            .map_err(|e| backtest_err(format!("failed to scan {}: {}", self.dir.display(), e)))?;

        let stored = StoredBacktest {
            id,
            name: report.name.clone(),
            trade_count: report.output.executed_trades.len(),
        };

        // The summary is what `next_id` counts, so it only lands once the
        // trades are on disk.
        if let Err(e) = self.write_trades(&stored, &report.output.executed_trades) {
            let _ = fs::remove_file(self.trades_path(&stored));
            return Err(e);
        }

        let report_path = self.report_path(&stored);
        let json = serde_json::to_string_pretty(report).map_err(|e| backtest_err(e.to_string()))?;
        fs::write(&report_path, json).map_err(|e| {
            backtest_err(format!("failed to write {}: {}", report_path.display(), e))
        })?;
        debug!(path = %report_path.display(), "wrote backtest summary");

        info!(id, name = %stored.name, trades = stored.trade_count, "backtest saved to journal");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::{run_backtest, BacktestConfig, SignalSource};
    use crate::domain::bar::PriceBar;
    use crate::domain::metrics::Metrics;
    use crate::domain::signal::{Action, Signal};
    use crate::domain::simulator::SimulationConfig;
    use crate::ports::data_port::DataPort;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    struct FixedBars(Vec<PriceBar>);

    impl DataPort for FixedBars {
        fn fetch_bars(
            &self,
            _symbol: &str,
            _timeframe: &str,
            _start_date: NaiveDate,
            _end_date: NaiveDate,
        ) -> Result<Vec<PriceBar>, TradesimError> {
            Ok(self.0.clone())
        }

        fn list_symbols(&self, _timeframe: &str) -> Result<Vec<String>, TradesimError> {
            Ok(vec![])
        }

        fn get_data_range(
            &self,
            _symbol: &str,
            _timeframe: &str,
        ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, TradesimError> {
            Ok(None)
        }
    }

    fn sample_report() -> BacktestReport {
        let bars: Vec<PriceBar> = (0..6)
            .map(|i| PriceBar::new(i * 3600, 1.1, 1.1005, 1.0995, 1.1))
            .collect();
        let signals = vec![
            Signal::new(3600, Action::Buy, 1.1),
            Signal::new(3 * 3600, Action::Sell, 1.1),
        ];
        let config = BacktestConfig {
            symbol: "EURUSD".into(),
            timeframe: "H1".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            simulation: SimulationConfig::new(10_000.0, 1.0, 2.0),
        };
        let source = SignalSource::Provided {
            name: "Manual Signals".into(),
            signals,
        };
        run_backtest(&FixedBars(bars), &config, source).unwrap()
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(
            sanitize_name("Golden Cross_$10000_1.5%_2"),
            "Golden_Cross__10000_1.5__2"
        );
        assert_eq!(sanitize_name("a/b\\c"), "a_b_c");
    }

    #[test]
    fn save_writes_summary_and_trades() {
        let dir = TempDir::new().unwrap();
        let journal = CsvJournalAdapter::new(dir.path().join("journal"));
        let report = sample_report();

        let stored = journal.save_backtest(&report).unwrap();
        assert_eq!(stored.id, 1);
        assert_eq!(stored.trade_count, report.output.executed_trades.len());
        assert!(journal.report_path(&stored).exists());
        assert!(journal.trades_path(&stored).exists());

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(journal.report_path(&stored)).unwrap())
                .unwrap();
        assert_eq!(json["name"], report.name.as_str());
    }

    #[test]
    fn ids_increase_across_saves() {
        let dir = TempDir::new().unwrap();
        let journal = CsvJournalAdapter::new(dir.path().to_path_buf());
        let report = sample_report();

        let first = journal.save_backtest(&report).unwrap();
        let second = journal.save_backtest(&report).unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_ne!(journal.trades_path(&first), journal.trades_path(&second));
    }

    #[test]
    fn stored_trades_reproduce_metrics() {
        let dir = TempDir::new().unwrap();
        let journal = CsvJournalAdapter::new(dir.path().to_path_buf());
        let report = sample_report();

        let stored = journal.save_backtest(&report).unwrap();
        let trades = journal.load_trades(&stored).unwrap();
        assert_eq!(trades, report.output.executed_trades);

        let recomputed = Metrics::from_trades(&trades, &report.output.equity_curve);
        assert_eq!(recomputed, report.output.metrics);
    }

    #[test]
    fn failed_trades_leave_no_summary() {
        let dir = TempDir::new().unwrap();
        let journal = CsvJournalAdapter::new(dir.path().to_path_buf());
        let report = sample_report();
        let pending = StoredBacktest {
            id: 1,
            name: report.name.clone(),
            trade_count: 0,
        };
        // A directory squatting on the trades file makes the CSV write fail.
        fs::create_dir(journal.trades_path(&pending)).unwrap();

        assert!(journal.save_backtest(&report).is_err());
        assert!(!journal.report_path(&pending).exists());
        assert_eq!(journal.next_id().unwrap(), 1);
    }

    #[test]
    fn unwritable_directory_is_backtest_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, "x").unwrap();
        let journal = CsvJournalAdapter::new(blocker);

        let err = journal.save_backtest(&sample_report()).unwrap_err();
        assert!(matches!(err, PersistError::Backtest { .. }));
        assert!(err.trade().is_none());
    }
}
