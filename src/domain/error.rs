//! Domain error types.

use crate::domain::position::ExecutedTrade;

/// Failures raised by a single simulation run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimulationError {
    #[error("invalid simulation config: {reason}")]
    InvalidConfig { reason: String },

    #[error("candle limit exceeded: have {bars} bars, limit is {limit}")]
    CandleLimitExceeded { bars: usize, limit: usize },
}

/// Failures raised by the persistence collaborator.
///
/// A failure while storing a single trade carries the trade that could not be
/// stored so the caller can retry or report it.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("failed to store backtest {name}: {reason}")]
    Backtest { name: String, reason: String },

    #[error("failed to store trade {} -> {}: {reason}", trade.entry_index, trade.exit_index)]
    Trade {
        trade: Box<ExecutedTrade>,
        reason: String,
    },
}

impl PersistError {
    /// The trade payload attached to a per-trade failure, if any.
    pub fn trade(&self) -> Option<&ExecutedTrade> {
        match self {
            PersistError::Trade { trade, .. } => Some(trade),
            PersistError::Backtest { .. } => None,
        }
    }
}

/// Top-level error type for tradesim.
#[derive(Debug, thiserror::Error)]
pub enum TradesimError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data schema error in {source_name}: {reason}")]
    DataSchema { source_name: String, reason: String },

    #[error("no data for {symbol} ({timeframe})")]
    NoData { symbol: String, timeframe: String },

    #[error("unknown strategy type: {name}")]
    UnknownStrategy { name: String },

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&TradesimError> for std::process::ExitCode {
    fn from(err: &TradesimError) -> Self {
        let code: u8 = match err {
            TradesimError::Io(_) | TradesimError::Json(_) => 1,
            TradesimError::ConfigParse { .. }
            | TradesimError::ConfigMissing { .. }
            | TradesimError::ConfigInvalid { .. } => 2,
            TradesimError::DataSchema { .. } | TradesimError::NoData { .. } => 3,
            TradesimError::UnknownStrategy { .. } => 4,
            TradesimError::Simulation(_) => 5,
            TradesimError::Persist(_) => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::ExitReason;
    use crate::domain::signal::Action;

    fn sample_trade() -> ExecutedTrade {
        ExecutedTrade {
            entry_index: 3,
            exit_index: 7,
            entry_action: Action::Buy,
            exit_action: Action::Sell,
            entry_price: 1.1,
            exit_price: 1.2,
            sl_price: 1.05,
            tp_price: 1.2,
            profit: 200.0,
            pips: 0.1,
            open_timestamp: 1_700_000_000,
            close_timestamp: 1_700_014_400,
            exit_reason: ExitReason::TakeProfit,
        }
    }

    #[test]
    fn persist_error_keeps_trade_payload() {
        let err = PersistError::Trade {
            trade: Box::new(sample_trade()),
            reason: "disk full".into(),
        };
        assert_eq!(err.trade(), Some(&sample_trade()));
        assert_eq!(err.to_string(), "failed to store trade 3 -> 7: disk full");
    }

    #[test]
    fn backtest_failure_has_no_trade() {
        let err = PersistError::Backtest {
            name: "x".into(),
            reason: "locked".into(),
        };
        assert!(err.trade().is_none());
    }

    #[test]
    fn simulation_error_converts_to_top_level() {
        let err: TradesimError = SimulationError::CandleLimitExceeded { bars: 10, limit: 5 }.into();
        assert_eq!(
            err.to_string(),
            "candle limit exceeded: have 10 bars, limit is 5"
        );
    }

    #[test]
    fn config_errors_display_section_and_key() {
        let err = TradesimError::ConfigMissing {
            section: "backtest".into(),
            key: "symbol".into(),
        };
        assert_eq!(err.to_string(), "missing config key [backtest] symbol");
    }
}
