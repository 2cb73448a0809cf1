//! The `catsim export` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use catsim_core::report::SimulationReport;
use catsim_report::{write_csv_report, write_html_report};

use super::{ensure_known_formats, parse_formats};

const FORMATS: [&str; 2] = ["csv", "html"];

pub fn execute(report_path: PathBuf, output: PathBuf, format: String) -> Result<()> {
    let formats = parse_formats(&format, &FORMATS);
    ensure_known_formats(&formats, &FORMATS)?;

    let report = SimulationReport::load_json(&report_path)?;
    let stem = report_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("report")
        .to_string();

    std::fs::create_dir_all(&output)
        .with_context(|| format!("failed to create output directory {}", output.display()))?;

    println!(
        "Report {}: {} sessions, seed {}",
        report.id,
        report.trajectories.len(),
        report.settings.seed
    );

    for fmt in &formats {
        match *fmt {
            "csv" => {
                let path = output.join(format!("{stem}.csv"));
                write_csv_report(&report, &path)?;
                println!("CSV export: {}", path.display());
            }
            "html" => {
                let path = output.join(format!("{stem}.html"));
                write_html_report(&report, &path)?;
                println!("HTML report: {}", path.display());
            }
            other => anyhow::bail!("unknown output format '{other}'"),
        }
    }

    Ok(())
}
