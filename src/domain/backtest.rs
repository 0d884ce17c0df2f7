//! Backtest orchestration: fetch bars, obtain signals, simulate.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::error::TradesimError;
use crate::domain::signal::Signal;
use crate::domain::simulator::{simulate, SimulationConfig, SimulationOutput};
use crate::domain::strategy::Strategy;
use crate::ports::data_port::DataPort;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub symbol: String,
    pub timeframe: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub simulation: SimulationConfig,
}

/// Where a backtest gets its signals from.
#[derive(Debug, Clone)]
pub enum SignalSource<'a> {
    Strategy(&'a Strategy),
    /// Pre-computed signals, e.g. loaded from a file.
    Provided { name: String, signals: Vec<Signal> },
}

impl SignalSource<'_> {
    pub fn name(&self) -> &str {
        match self {
            SignalSource::Strategy(strategy) => &strategy.name,
            SignalSource::Provided { name, .. } => name,
        }
    }
}

/// Everything needed to store or render one finished backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub name: String,
    pub strategy: String,
    pub symbol: String,
    pub timeframe: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_balance: f64,
    pub risk_per_trade: f64,
    pub risk_reward_ratio: f64,
    pub bar_count: usize,
    pub signal_count: usize,
    #[serde(flatten)]
    pub output: SimulationOutput,
}

/// `{strategy}_${balance}_{risk}%_{rr}_{start}_{end}`
pub fn backtest_name(strategy_name: &str, config: &BacktestConfig) -> String {
    format!(
        "{}_${}_{}%_{}_{}_{}",
        strategy_name,
        config.simulation.initial_balance,
        config.simulation.risk_per_trade,
        config.simulation.risk_reward_ratio,
        config.start_date,
        config.end_date,
    )
}

pub fn run_backtest(
    data_port: &dyn DataPort,
    config: &BacktestConfig,
    source: SignalSource<'_>,
) -> Result<BacktestReport, TradesimError> {
    let bars = data_port.fetch_bars(
        &config.symbol,
        &config.timeframe,
        config.start_date,
        config.end_date,
    )?;
    if bars.is_empty() {
        warn!(
            symbol = %config.symbol,
            timeframe = %config.timeframe,
            start = %config.start_date,
            end = %config.end_date,
            "no bars in date range"
        );
    }

    let strategy_name = source.name().to_string();
    let signals = match source {
        SignalSource::Strategy(strategy) => strategy.generate_signals(&bars)?,
        SignalSource::Provided { signals, .. } => signals,
    };
    info!(
        symbol = %config.symbol,
        strategy = %strategy_name,
        bars = bars.len(),
        signals = signals.len(),
        "running backtest"
    );

    let output = simulate(&bars, &signals, &config.symbol, &config.simulation)?;

    Ok(BacktestReport {
        name: backtest_name(&strategy_name, config),
        strategy: strategy_name,
        symbol: config.symbol.clone(),
        timeframe: config.timeframe.clone(),
        start_date: config.start_date,
        end_date: config.end_date,
        initial_balance: config.simulation.initial_balance,
        risk_per_trade: config.simulation.risk_per_trade,
        risk_reward_ratio: config.simulation.risk_reward_ratio,
        bar_count: bars.len(),
        signal_count: signals.len(),
        output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> BacktestConfig {
        BacktestConfig {
            symbol: "EURUSD".into(),
            timeframe: "H1".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            simulation: SimulationConfig::new(10_000.0, 1.5, 2.0),
        }
    }

    #[test]
    fn name_encodes_parameters() {
        let name = backtest_name("Golden Cross", &sample_config());
        assert_eq!(name, "Golden Cross_$10000_1.5%_2_2024-01-01_2024-06-30");
    }

    #[test]
    fn provided_source_uses_given_name() {
        let source = SignalSource::Provided {
            name: "signals.csv".into(),
            signals: vec![],
        };
        assert_eq!(source.name(), "signals.csv");
    }
}
