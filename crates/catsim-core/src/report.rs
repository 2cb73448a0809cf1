//! Simulation report types with JSON persistence.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{EstimationMethod, ItemPool, StopReason, StoppingRule, Trajectory};
use crate::statistics::{export_rows, AggregateStats, ConditionalStats, ExportRow};

/// A complete simulation report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    /// Settings the batch ran with.
    pub settings: SimulationSettings,
    /// One trajectory per session, examinee-major.
    pub trajectories: Vec<Trajectory>,
    /// Aggregate statistics; `None` only for an empty batch.
    pub aggregate: Option<AggregateStats>,
    /// Statistics per distinct true ability.
    pub conditional: Vec<ConditionalStats>,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// The resolved settings of a batch, including the base seed actually used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSettings {
    pub pool: ItemPool,
    pub method: EstimationMethod,
    pub stopping_rule: StoppingRule,
    pub seed: u64,
    pub replications: u32,
    pub parallelism: usize,
}

impl SimulationReport {
    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: SimulationReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Flat per-session rows for tabular export.
    pub fn export_rows(&self) -> Vec<ExportRow> {
        export_rows(&self.trajectories)
    }

    /// How many sessions ended for each reason, in a fixed order.
    pub fn stop_reason_counts(&self) -> Vec<(StopReason, usize)> {
        [
            StopReason::FixedLengthReached,
            StopReason::TargetSemReached,
            StopReason::PoolExhausted,
            StopReason::NoInformativeItem,
            StopReason::Interrupted,
        ]
        .into_iter()
        .map(|reason| {
            let count = self
                .trajectories
                .iter()
                .filter(|t| t.stop_reason == reason)
                .count();
            (reason, count)
        })
        .filter(|(_, count)| *count > 0)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProgressionStep;
    use crate::statistics::{compute_aggregate_stats, compute_conditional_stats};

    fn sample_report() -> SimulationReport {
        let trajectories = vec![
            Trajectory {
                true_ability: 0.7,
                final_estimate: 0.9,
                final_se: 0.8,
                items_administered: 7,
                stop_reason: StopReason::FixedLengthReached,
                seed: Some(42),
                progression: vec![ProgressionStep::initial()],
            },
            Trajectory {
                true_ability: -1.0,
                final_estimate: 0.0,
                final_se: f64::INFINITY,
                items_administered: 0,
                stop_reason: StopReason::NoInformativeItem,
                seed: Some(43),
                progression: vec![ProgressionStep::initial()],
            },
        ];
        SimulationReport {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            settings: SimulationSettings {
                pool: ItemPool::from_difficulties(&[-1.0, 0.0, 1.0]).unwrap(),
                method: EstimationMethod::Wle,
                stopping_rule: StoppingRule::TargetSem { target: 0.3 },
                seed: 42,
                replications: 1,
                parallelism: 4,
            },
            aggregate: compute_aggregate_stats(&trajectories),
            conditional: compute_conditional_stats(&trajectories),
            trajectories,
            duration_ms: 12,
        }
    }

    #[test]
    fn json_round_trip_keeps_infinite_se() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");
        let report = sample_report();
        report.save_json(&path).unwrap();

        let loaded = SimulationReport::load_json(&path).unwrap();
        assert_eq!(loaded.id, report.id);
        assert_eq!(loaded.settings, report.settings);
        assert_eq!(loaded.trajectories[0], report.trajectories[0]);
        assert!(loaded.trajectories[1].final_se.is_infinite());
        assert!(loaded.aggregate.unwrap().avg_se.is_infinite());
    }

    #[test]
    fn load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = SimulationReport::load_json(&dir.path().join("none.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read report"));
    }

    #[test]
    fn rows_and_stop_reasons() {
        let report = sample_report();
        let rows = report.export_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].index, 2);
        assert_eq!(
            report.stop_reason_counts(),
            vec![
                (StopReason::FixedLengthReached, 1),
                (StopReason::NoInformativeItem, 1)
            ]
        );
    }
}
