//! JSON report writer.

use crate::domain::backtest::BacktestReport;
use crate::domain::error::TradesimError;
use crate::ports::report_port::ReportPort;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Writes the whole report as pretty-printed JSON.
pub struct JsonReportAdapter;

impl ReportPort for JsonReportAdapter {
    fn write(&self, report: &BacktestReport, output_path: &Path) -> Result<(), TradesimError> {
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(output_path)?);
        serde_json::to_writer_pretty(&mut writer, report)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        debug!(path = %output_path.display(), "report written");
        Ok(())
    }
}
