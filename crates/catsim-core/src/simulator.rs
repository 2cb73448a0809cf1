//! Stochastic response generation.

use rand::Rng;

use crate::irt::probability;
use crate::model::Item;

/// Draw one 0/1 response for an examinee of `true_ability` answering `item`.
///
/// Consumes exactly one `f64` from `rng`; all other state lives in the caller.
pub fn simulate_response<R>(rng: &mut R, true_ability: f64, item: &Item) -> u8
where
    R: Rng + ?Sized,
{
    let p = probability(true_ability, item.difficulty, item.discrimination);
    u8::from(rng.gen::<f64>() < p)
}
