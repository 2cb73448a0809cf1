//! catsim-report: file outputs for simulation reports.
//!
//! The JSON form lives on [`catsim_core::report::SimulationReport`] itself;
//! this crate adds the flat CSV export and the self-contained HTML page.

pub mod export;
pub mod html;

pub use export::{read_csv, write_csv, write_csv_report};
pub use html::{generate_html, write_html_report};
