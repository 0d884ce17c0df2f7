//! CSV file data adapter.
//!
//! Bars live in `<base>/<SYMBOL>_<TIMEFRAME>.csv` with the header
//! `timestamp,open,high,low,close`. Signal files use `timestamp,action,price`.
//! Timestamps are epoch seconds or `YYYY-MM-DD[ HH:MM:SS]`, read as UTC.

use crate::domain::bar::PriceBar;
use crate::domain::error::TradesimError;
use crate::domain::signal::{Action, Signal};
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const BAR_COLUMNS: [&str; 5] = ["timestamp", "open", "high", "low", "close"];
const SIGNAL_COLUMNS: [&str; 3] = ["timestamp", "action", "price"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, timeframe: &str) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, timeframe))
    }

    /// All bars in a file, sorted by timestamp.
    fn read_bars(&self, symbol: &str, timeframe: &str) -> Result<Vec<PriceBar>, TradesimError> {
        let path = self.csv_path(symbol, timeframe);
        if !path.exists() {
            return Err(TradesimError::NoData {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            });
        }
        let source = path.display().to_string();
        let mut rdr = open_reader(&path, &source)?;
        let columns = column_positions(&mut rdr, &BAR_COLUMNS, &source)?;

        let mut bars = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| schema(&source, format!("CSV parse error: {}", e)))?;
            let line = row + 2;
            let timestamp = parse_timestamp(field(&record, columns[0], "timestamp", &source, line)?)
                .ok_or_else(|| schema(&source, format!("line {}: invalid timestamp", line)))?;
            let mut ohlc = [0.0; 4];
            for (slot, value) in ohlc.iter_mut().enumerate() {
                *value = number(&record, columns[slot + 1], BAR_COLUMNS[slot + 1], &source, line)?;
            }
            let [open, high, low, close] = ohlc;
            bars.push(PriceBar::new(timestamp, open, high, low, close));
        }

        bars.sort_by_key(|b| b.timestamp);
        debug!(path = %source, bars = bars.len(), "loaded bars");
        Ok(bars)
    }

    /// Load a signal file. Rows are returned sorted by timestamp; rows with
    /// equal timestamps keep their file order.
    pub fn load_signals(path: &Path) -> Result<Vec<Signal>, TradesimError> {
        let source = path.display().to_string();
        let mut rdr = open_reader(path, &source)?;
        let columns = column_positions(&mut rdr, &SIGNAL_COLUMNS, &source)?;

        let mut signals = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| schema(&source, format!("CSV parse error: {}", e)))?;
            let line = row + 2;
            let timestamp = parse_timestamp(field(&record, columns[0], "timestamp", &source, line)?)
                .ok_or_else(|| schema(&source, format!("line {}: invalid timestamp", line)))?;
            let action: Action = field(&record, columns[1], "action", &source, line)?
                .parse()
                .map_err(|e| schema(&source, format!("line {}: {}", line, e)))?;
            let price = number(&record, columns[2], "price", &source, line)?;
            signals.push(Signal::new(timestamp, action, price));
        }

        signals.sort_by_key(|s| s.timestamp);
        debug!(path = %source, signals = signals.len(), "loaded signals");
        Ok(signals)
    }
}

fn schema(source: &str, reason: String) -> TradesimError {
    TradesimError::DataSchema {
        source_name: source.to_string(),
        reason,
    }
}

/// Index of each wanted column in the header row.
fn column_positions<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
    wanted: &[&str],
    source: &str,
) -> Result<Vec<usize>, TradesimError> {
    let headers = rdr
        .headers()
        .map_err(|e| schema(source, format!("unreadable header: {}", e)))?;
    wanted
        .iter()
        .map(|name| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| schema(source, format!("missing {} column", name)))
        })
        .collect()
}

fn field<'r>(
    record: &'r StringRecord,
    position: usize,
    name: &str,
    source: &str,
    line: usize,
) -> Result<&'r str, TradesimError> {
    match record.get(position) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(schema(source, format!("line {}: missing {} field", line, name))),
    }
}

fn number(
    record: &StringRecord,
    position: usize,
    name: &str,
    source: &str,
    line: usize,
) -> Result<f64, TradesimError> {
    let raw = field(record, position, name, source, line)?;
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(schema(
            source,
            format!("line {}: invalid {} value: {}", line, name, raw),
        )),
    }
}

fn open_reader(path: &Path, source: &str) -> Result<csv::Reader<fs::File>, TradesimError> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| match e.into_kind() {
            csv::ErrorKind::Io(io) => TradesimError::Io(io),
            other => schema(source, format!("{:?}", other)),
        })
}

/// Epoch seconds, or a UTC date / datetime.
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    if let Ok(epoch) = raw.parse::<i64>() {
        return Some(epoch);
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.and_utc().timestamp());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

fn bar_date(bar: &PriceBar) -> Option<NaiveDate> {
    bar.datetime().map(|dt| dt.date_naive())
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, TradesimError> {
        let bars = self
            .read_bars(symbol, timeframe)?
            .into_iter()
            .filter(|bar| bar_date(bar).is_some_and(|d| d >= start_date && d <= end_date))
            .collect();
        Ok(bars)
    }

    fn list_symbols(&self, timeframe: &str) -> Result<Vec<String>, TradesimError> {
        let entries = fs::read_dir(&self.base_path)?;

        let suffix = format!("_{}.csv", timeframe);
        let mut symbols = Vec::new();

        for entry in entries {
            let name = entry?.file_name();
            let name_str = name.to_string_lossy();

            if let Some(symbol) = name_str.strip_suffix(&suffix) {
                if !symbol.is_empty() {
                    symbols.push(symbol.to_string());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
        timeframe: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, TradesimError> {
        let bars = match self.read_bars(symbol, timeframe) {
            Ok(bars) => bars,
            Err(TradesimError::NoData { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let first = bars.first().and_then(bar_date);
        let last = bars.last().and_then(bar_date);
        Ok(first.zip(last).map(|(first, last)| (first, last, bars.len())))
    }
}
