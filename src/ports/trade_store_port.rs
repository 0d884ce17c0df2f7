//! Persistence port for finished backtests.

use serde::{Deserialize, Serialize};

use crate::domain::backtest::BacktestReport;
use crate::domain::error::PersistError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBacktest {
    pub id: u64,
    pub name: String,
    pub trade_count: usize,
}

/// Stores a backtest and its trades, assigning it an identity.
///
/// A failure on an individual trade must be reported as
/// [`PersistError::Trade`] carrying that trade.
pub trait TradeStorePort {
    fn save_backtest(&self, report: &BacktestReport) -> Result<StoredBacktest, PersistError>;
}
