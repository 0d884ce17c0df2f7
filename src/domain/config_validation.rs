//! Configuration validation.
//!
//! Checks every config field before a backtest runs, so the engine only ever
//! sees values it can use.

use crate::domain::error::TradesimError;
use crate::domain::strategy::{StrategyParams, StrategyType};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

/// Keys in `[strategy]` that are not numeric strategy parameters.
pub const STRATEGY_META_KEYS: [&str; 2] = ["name", "type"];

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    required_string(config, "backtest", "symbol")?;
    required_string(config, "backtest", "timeframe")?;
    validate_dates(config)?;
    validate_initial_balance(config)?;
    validate_risk_per_trade(config)?;
    validate_risk_reward_ratio(config)?;
    validate_max_candles(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    let strategy_type: StrategyType = required_string(config, "strategy", "type")?.parse()?;
    let params = read_strategy_params(config)?;
    strategy_type.validate(&params)
}

/// Collect the numeric parameters of `[strategy]`.
pub fn read_strategy_params(config: &dyn ConfigPort) -> Result<StrategyParams, TradesimError> {
    let mut params = StrategyParams::new();
    for key in config.keys("strategy") {
        if STRATEGY_META_KEYS.contains(&key.as_str()) {
            continue;
        }
        let raw = config.get_string("strategy", &key).unwrap_or_default();
        let value = raw
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid("strategy", &key, format!("{key} must be a number")))?;
        params.insert(&key, value);
    }
    Ok(params)
}

pub fn required_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, TradesimError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(TradesimError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn invalid(section: &str, key: &str, reason: String) -> TradesimError {
    TradesimError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}

/// A present, finite number. Missing keys and unparseable values are
/// distinguished so the error points at the right problem.
pub fn required_number(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<f64, TradesimError> {
    let raw = required_string(config, section, key)?;
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(invalid(section, key, format!("{key} must be a number"))),
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    let start_date = parse_date(config, "start_date")?;
    let end_date = parse_date(config, "end_date")?;

    if start_date >= end_date {
        return Err(invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date".to_string(),
        ));
    }
    Ok(())
}

pub fn parse_date(config: &dyn ConfigPort, field: &str) -> Result<NaiveDate, TradesimError> {
    let value = required_string(config, "backtest", field)?;
    NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|_| {
        invalid(
            "backtest",
            field,
            format!("invalid {field} format, expected YYYY-MM-DD"),
        )
    })
}

fn validate_initial_balance(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    let value = required_number(config, "backtest", "initial_balance")?;
    if value <= 0.0 {
        return Err(invalid(
            "backtest",
            "initial_balance",
            "initial_balance must be positive".to_string(),
        ));
    }
    Ok(())
}

fn validate_risk_per_trade(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    let value = required_number(config, "backtest", "risk_per_trade")?;
    if value <= 0.0 || value > 100.0 {
        return Err(invalid(
            "backtest",
            "risk_per_trade",
            "risk_per_trade must be in (0, 100]".to_string(),
        ));
    }
    Ok(())
}

fn validate_risk_reward_ratio(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    let value = required_number(config, "backtest", "risk_reward_ratio")?;
    if value <= 0.0 {
        return Err(invalid(
            "backtest",
            "risk_reward_ratio",
            "risk_reward_ratio must be positive".to_string(),
        ));
    }
    Ok(())
}

fn validate_max_candles(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    if config.get_string("backtest", "max_candles").is_none() {
        return Ok(());
    }
    let value = config.get_int("backtest", "max_candles", 0);
    if value < 1 {
        return Err(invalid(
            "backtest",
            "max_candles",
            "max_candles must be a whole number of at least 1".to_string(),
        ));
    }
    Ok(())
}
