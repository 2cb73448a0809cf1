//! Cross-examinee accuracy statistics.
//!
//! Everything here is a pure function of a trajectory set and is recomputed
//! whenever that set changes.

use serde::{Deserialize, Serialize};

use crate::model::{extended_float, Trajectory};

/// Aggregate accuracy and efficiency over all trajectories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub examinee_count: usize,
    /// Mean of (estimate - true ability).
    pub bias: f64,
    pub rmse: f64,
    pub mae: f64,
    /// Population Pearson correlation of true and estimated ability.
    /// `None` when either variable has zero variance.
    pub correlation: Option<f64>,
    pub avg_items: f64,
    /// Mean final SE. Infinite SEs propagate.
    #[serde(with = "extended_float")]
    pub avg_se: f64,
    /// Per-examinee errors in input order.
    pub errors: Vec<f64>,
}

/// Accuracy at one true ability value, across its replications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalStats {
    pub true_ability: f64,
    pub replications: usize,
    pub mean_estimate: f64,
    pub bias: f64,
    pub mse: f64,
    pub avg_items: f64,
}

/// One flat row per examinee, for tabular export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    /// 1-based position in the input order.
    #[serde(rename = "TestTakerID")]
    pub index: usize,
    #[serde(rename = "TrueAbility")]
    pub true_ability: f64,
    #[serde(rename = "FinalEstimate")]
    pub final_estimate: f64,
    #[serde(rename = "FinalSE", with = "extended_float")]
    pub final_se: f64,
    #[serde(rename = "ItemsAdministered")]
    pub items_administered: usize,
    #[serde(rename = "Error")]
    pub error: f64,
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    sum / n as f64
}

/// Compute aggregate statistics, or `None` for an empty trajectory set.
pub fn compute_aggregate_stats(trajectories: &[Trajectory]) -> Option<AggregateStats> {
    if trajectories.is_empty() {
        return None;
    }

    let errors: Vec<f64> = trajectories.iter().map(Trajectory::error).collect();
    let bias = mean(errors.iter().copied());
    let rmse = mean(errors.iter().map(|e| e * e)).sqrt();
    let mae = mean(errors.iter().map(|e| e.abs()));

    let correlation = pearson(
        trajectories.iter().map(|t| t.true_ability),
        trajectories.iter().map(|t| t.final_estimate),
    );

    let avg_items = mean(trajectories.iter().map(|t| t.items_administered as f64));
    let avg_se = mean(trajectories.iter().map(|t| t.final_se));

    Some(AggregateStats {
        examinee_count: trajectories.len(),
        bias,
        rmse,
        mae,
        correlation,
        avg_items,
        avg_se,
        errors,
    })
}

/// Population Pearson correlation; `None` if either side has no variance.
fn pearson<X, Y>(xs: X, ys: Y) -> Option<f64>
where
    X: Iterator<Item = f64> + Clone,
    Y: Iterator<Item = f64> + Clone,
{
    if !has_spread(xs.clone()) || !has_spread(ys.clone()) {
        return None;
    }

    let mean_x = mean(xs.clone());
    let mean_y = mean(ys.clone());

    let mut num = 0.0;
    let mut den_x = 0.0;
    let mut den_y = 0.0;
    for (x, y) in xs.zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        num += dx * dy;
        den_x += dx * dx;
        den_y += dy * dy;
    }

    if den_x == 0.0 || den_y == 0.0 {
        return None;
    }
    Some(num / (den_x * den_y).sqrt())
}

/// Whether the values are not all identical. Checked on the raw values since
/// deviations around a float mean are rarely exactly zero.
fn has_spread<I: Iterator<Item = f64>>(mut values: I) -> bool {
    match values.next() {
        Some(first) => values.any(|v| v != first),
        None => false,
    }
}

/// Group trajectories by true ability (first-seen order) and summarize each.
pub fn compute_conditional_stats(trajectories: &[Trajectory]) -> Vec<ConditionalStats> {
    let mut groups: Vec<(f64, Vec<&Trajectory>)> = Vec::new();
    for t in trajectories {
        match groups.iter_mut().find(|(ability, _)| *ability == t.true_ability) {
            Some((_, members)) => members.push(t),
            None => groups.push((t.true_ability, vec![t])),
        }
    }

    groups
        .into_iter()
        .map(|(true_ability, members)| {
            let mean_estimate = mean(members.iter().map(|t| t.final_estimate));
            let mse = mean(members.iter().map(|t| t.error() * t.error()));
            ConditionalStats {
                true_ability,
                replications: members.len(),
                mean_estimate,
                bias: mean_estimate - true_ability,
                mse,
                avg_items: mean(members.iter().map(|t| t.items_administered as f64)),
            }
        })
        .collect()
}

/// Flatten trajectories into export rows, numbered from 1.
pub fn export_rows(trajectories: &[Trajectory]) -> Vec<ExportRow> {
    trajectories
        .iter()
        .enumerate()
        .map(|(idx, t)| ExportRow {
            index: idx + 1,
            true_ability: t.true_ability,
            final_estimate: t.final_estimate,
            final_se: t.final_se,
            items_administered: t.items_administered,
            error: t.error(),
        })
        .collect()
}
