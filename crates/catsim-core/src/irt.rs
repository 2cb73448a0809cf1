//! Two-parameter logistic (2PL) response model.

/// Probability of a correct response under the 2PL model.
///
/// p = 1 / (1 + exp(-a * (theta - b)))
pub fn probability(ability: f64, difficulty: f64, discrimination: f64) -> f64 {
    let z = discrimination * (ability - difficulty);
    1.0 / (1.0 + (-z).exp())
}

/// Fisher information an item provides about ability at `ability`.
///
/// I = a^2 * p * (1 - p), maximized where ability equals difficulty.
pub fn fisher_information(ability: f64, difficulty: f64, discrimination: f64) -> f64 {
    let p = probability(ability, difficulty, discrimination);
    discrimination * discrimination * p * (1.0 - p)
}
