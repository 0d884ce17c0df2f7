//! Report generation port.

use std::path::Path;

use crate::domain::backtest::BacktestReport;
use crate::domain::error::TradesimError;

/// Port for writing backtest reports.
pub trait ReportPort {
    fn write(&self, report: &BacktestReport, output_path: &Path) -> Result<(), TradesimError>;
}
