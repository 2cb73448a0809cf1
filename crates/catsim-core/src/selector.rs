//! Maximum-information item selection.

use std::collections::HashSet;

use crate::irt::fisher_information;
use crate::model::{Item, ItemPool};

/// Pick the unused item with the highest Fisher information at `estimate`.
///
/// Scans in pool order and only replaces the running best on a strictly
/// greater value, so ties resolve to the earliest item. The running maximum
/// starts at zero: an item with zero information is never returned. `None`
/// means the pool is exhausted or nothing informative remains.
pub fn select_next_item<'a>(
    pool: &'a ItemPool,
    estimate: f64,
    used: &HashSet<u32>,
) -> Option<&'a Item> {
    let mut best: Option<&Item> = None;
    let mut max_info = 0.0_f64;

    for item in pool {
        if used.contains(&item.id) {
            continue;
        }
        let info = fisher_information(estimate, item.difficulty, item.discrimination);
        if info > max_info {
            max_info = info;
            best = Some(item);
        }
    }

    best
}
