#![allow(dead_code)]

use chrono::NaiveDate;
use std::cell::RefCell;
use std::collections::HashMap;
use tradesim::domain::backtest::{BacktestConfig, BacktestReport};
use tradesim::domain::bar::PriceBar;
use tradesim::domain::error::{PersistError, TradesimError};
use tradesim::domain::signal::{Action, Signal};
use tradesim::domain::simulator::SimulationConfig;
use tradesim::ports::data_port::DataPort;
use tradesim::ports::trade_store_port::{StoredBacktest, TradeStorePort};

pub struct MockDataPort {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    fn check(&self, symbol: &str) -> Result<(), TradesimError> {
        match self.errors.get(symbol) {
            Some(reason) => Err(TradesimError::DataSchema {
                source_name: symbol.to_string(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        _start_date: NaiveDate,
        _end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, TradesimError> {
        self.check(symbol)?;
        self.data
            .get(symbol)
            .cloned()
            .ok_or_else(|| TradesimError::NoData {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            })
    }

    fn list_symbols(&self, _timeframe: &str) -> Result<Vec<String>, TradesimError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
        _timeframe: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, TradesimError> {
        self.check(symbol)?;
        let Some(bars) = self.data.get(symbol).filter(|b| !b.is_empty()) else {
            return Ok(None);
        };
        let day = |b: &PriceBar| b.datetime().unwrap().date_naive();
        Ok(Some((day(&bars[0]), day(&bars[bars.len() - 1]), bars.len())))
    }
}

/// In-memory trade store. `fail_on_trade` makes the n-th trade (0-based) fail.
pub struct MemoryTradeStore {
    pub saved: RefCell<Vec<BacktestReport>>,
    pub fail_on_trade: Option<usize>,
}

impl MemoryTradeStore {
    pub fn new() -> Self {
        Self {
            saved: RefCell::new(Vec::new()),
            fail_on_trade: None,
        }
    }

    pub fn failing_on(index: usize) -> Self {
        Self {
            saved: RefCell::new(Vec::new()),
            fail_on_trade: Some(index),
        }
    }
}

impl TradeStorePort for MemoryTradeStore {
    fn save_backtest(&self, report: &BacktestReport) -> Result<StoredBacktest, PersistError> {
        if let Some(index) = self.fail_on_trade {
            if let Some(trade) = report.output.executed_trades.get(index) {
                return Err(PersistError::Trade {
                    trade: Box::new(trade.clone()),
                    reason: "constraint violation".into(),
                });
            }
        }
        let mut saved = self.saved.borrow_mut();
        saved.push(report.clone());
        Ok(StoredBacktest {
            id: saved.len() as u64,
            name: report.name.clone(),
            trade_count: report.output.executed_trades.len(),
        })
    }
}

pub const HOUR: i64 = 3600;
/// 2024-01-01 00:00:00 UTC
pub const T0: i64 = 1_704_067_200;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn flat_bars(count: usize, price: f64) -> Vec<PriceBar> {
    (0..count)
        .map(|i| PriceBar::new(T0 + i as i64 * HOUR, price, price, price, price))
        .collect()
}

/// Bars oscillating around `mid` with a fixed high-low range.
pub fn wave_bars(count: usize, mid: f64, amplitude: f64, half_range: f64) -> Vec<PriceBar> {
    (0..count)
        .map(|i| {
            let close = mid + (i as f64 / 5.0).sin() * amplitude;
            PriceBar::new(
                T0 + i as i64 * HOUR,
                close,
                close + half_range,
                close - half_range,
                close,
            )
        })
        .collect()
}

pub fn buy_at(index: usize, price: f64) -> Signal {
    Signal::new(T0 + index as i64 * HOUR, Action::Buy, price)
}

pub fn sell_at(index: usize, price: f64) -> Signal {
    Signal::new(T0 + index as i64 * HOUR, Action::Sell, price)
}

pub fn sample_config(symbol: &str) -> BacktestConfig {
    BacktestConfig {
        symbol: symbol.to_string(),
        timeframe: "H1".to_string(),
        start_date: date(2024, 1, 1),
        end_date: date(2024, 3, 31),
        simulation: SimulationConfig::new(10_000.0, 1.0, 2.0),
    }
}
