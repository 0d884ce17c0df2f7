//! Market-data access port.

use crate::domain::bar::PriceBar;
use crate::domain::error::TradesimError;
use chrono::NaiveDate;

/// Supplies bar series. Implementations must return bars sorted by
/// timestamp with every OHLC field present, and report a schema error
/// rather than defaulting a missing field.
pub trait DataPort {
    /// Bars between `start_date` 00:00 and `end_date` 23:59:59 UTC, inclusive.
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, TradesimError>;

    fn list_symbols(&self, timeframe: &str) -> Result<Vec<String>, TradesimError>;

    /// First date, last date and bar count, or `None` when there is no data.
    fn get_data_range(
        &self,
        symbol: &str,
        timeframe: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, TradesimError>;
}
