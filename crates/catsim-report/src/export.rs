//! CSV export, one row per session.
//!
//! Columns: `TestTakerID,TrueAbility,FinalEstimate,FinalSE,ItemsAdministered,Error`.
//! An unmeasured session writes its SE as `inf`.

use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};

use catsim_core::report::SimulationReport;
use catsim_core::statistics::ExportRow;

/// Write rows as CSV with a header line.
pub fn write_csv<W: Write>(rows: &[ExportRow], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)
            .with_context(|| format!("failed to write CSV row {}", row.index))?;
    }
    wtr.flush().context("failed to flush CSV output")?;
    Ok(())
}

/// Read rows back from CSV produced by [`write_csv`].
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<ExportRow>> {
    let mut rdr = csv::Reader::from_reader(reader);
    rdr.deserialize::<ExportRow>()
        .enumerate()
        .map(|(idx, row)| row.with_context(|| format!("invalid CSV record {}", idx + 1)))
        .collect()
}

/// Write a report's export rows to a CSV file.
pub fn write_csv_report(report: &SimulationReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_csv(&report.export_rows(), file)
        .with_context(|| format!("failed to write CSV report to {}", path.display()))
}
