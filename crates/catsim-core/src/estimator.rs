//! Ability estimation from a response history.
//!
//! Both estimators share a Newton-Raphson core on the likelihood score
//! equation. WLE adds Warm's bias correction to each step, which tempers the
//! boundary behaviour of plain MLE on all-correct or all-incorrect patterns.
//!
//! Estimation always restarts from zero and uses the full history, so the
//! result depends only on the administered items and responses.

use serde::{Deserialize, Serialize};

use crate::irt::{fisher_information, probability};
use crate::model::{Administration, EstimationMethod, MAX_ABILITY, MIN_ABILITY};

/// Newton-Raphson iteration cap.
pub const MAX_ITERATIONS: usize = 20;

/// Convergence threshold on the absolute score.
pub const TOLERANCE: f64 = 0.001;

/// Point estimate with its precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbilityEstimate {
    /// Ability estimate, clamped to [-4, 4].
    pub estimate: f64,
    /// sqrt(1 / fisher_info), or infinity when no information was gathered.
    #[serde(with = "crate::model::extended_float")]
    pub standard_error: f64,
    /// Total Fisher information of the history at `estimate`.
    pub fisher_info: f64,
}

/// How the Newton-Raphson loop ended. None of these is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Converged,
    /// The second derivative was exactly zero (no information).
    Degenerate,
    /// The update could not be represented (NaN); the previous estimate stands.
    Unstable,
    IterationsExhausted,
}

/// Estimate ability with the selected method.
pub fn estimate_ability(method: EstimationMethod, history: &[Administration]) -> AbilityEstimate {
    estimate_with_termination(method, history).0
}

/// Estimate ability and report how the iteration terminated.
pub fn estimate_with_termination(
    method: EstimationMethod,
    history: &[Administration],
) -> (AbilityEstimate, Termination) {
    let mut theta = 0.0_f64;
    let mut termination = Termination::IterationsExhausted;

    for _ in 0..MAX_ITERATIONS {
        let derivatives = Derivatives::at(theta, history);

        if derivatives.first.abs() < TOLERANCE {
            termination = Termination::Converged;
            break;
        }
        if derivatives.second == 0.0 {
            termination = Termination::Degenerate;
            break;
        }

        let mut next = theta - derivatives.first / derivatives.second;
        if method == EstimationMethod::Wle {
            let bias_correction =
                derivatives.third / (2.0 * derivatives.second * derivatives.second);
            next -= bias_correction;
        }

        if next.is_nan() {
            termination = Termination::Unstable;
            break;
        }
        theta = next.clamp(MIN_ABILITY, MAX_ABILITY);
    }

    let fisher_info = test_information(theta, history);
    let standard_error = standard_error(fisher_info);

    if termination == Termination::Unstable {
        tracing::warn!(
            ?method,
            theta,
            items = history.len(),
            "ability update was not representable, keeping previous estimate"
        );
    } else if termination != Termination::Converged {
        tracing::debug!(
            ?method,
            ?termination,
            theta,
            items = history.len(),
            "ability estimation did not converge"
        );
    }

    (
        AbilityEstimate {
            estimate: theta,
            standard_error,
            fisher_info,
        },
        termination,
    )
}

/// Total Fisher information of all administered items at `theta`.
pub fn test_information(theta: f64, history: &[Administration]) -> f64 {
    history
        .iter()
        .map(|a| fisher_information(theta, a.item.difficulty, a.item.discrimination))
        .sum()
}

/// Standard error from total information; infinite when nothing is known.
pub fn standard_error(total_information: f64) -> f64 {
    if total_information > 0.0 {
        (1.0 / total_information).sqrt()
    } else {
        f64::INFINITY
    }
}

/// Derivatives of the log-likelihood at one theta.
#[derive(Debug, Clone, Copy)]
struct Derivatives {
    /// Score: sum of a * (u - p).
    first: f64,
    /// Negated test information: -sum of a^2 * p * q.
    second: f64,
    /// Sum of a^3 * p * q * (q - p), used by the WLE correction.
    third: f64,
}

impl Derivatives {
    fn at(theta: f64, history: &[Administration]) -> Self {
        let mut d = Derivatives {
            first: 0.0,
            second: 0.0,
            third: 0.0,
        };
        for admin in history {
            let a = admin.item.discrimination;
            let p = probability(theta, admin.item.difficulty, a);
            let q = 1.0 - p;
            d.first += a * (f64::from(admin.response) - p);
            d.second -= a * a * p * q;
            d.third += a * a * a * p * q * (q - p);
        }
        d
    }
}
